/// Errors that can occur in the transport layer.
///
/// The variants separate the three failure families the state machine
/// reacts to differently: connection establishment, HTTP status, and a
/// stream that dropped mid-read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// A call was made before [`open`](crate::Transport::open) or after
    /// [`close`](crate::Transport::close).
    #[error("transport is not open")]
    NotOpen,

    /// The connection or TLS handshake could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The server answered with a non-success HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The connection dropped while a body or stream was being read.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// The call did not complete within the configured timeout.
    #[error("timed out")]
    Timeout,

    /// The HTTP layer produced a status code outside the valid range.
    #[error("invalid status code {0}")]
    InvalidStatus(u16),
}

impl TransportError {
    /// Whether the failure happened before a usable response existed.
    ///
    /// Only these are retried with backoff. A real HTTP status is an
    /// answer from the server and is never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Timeout | Self::InvalidStatus(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_connection_failures_true() {
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::InvalidStatus(0).is_retryable());
    }

    #[test]
    fn test_is_retryable_answered_requests_false() {
        assert!(!TransportError::Status(400).is_retryable());
        assert!(!TransportError::NotOpen.is_retryable());
        assert!(!TransportError::Disconnected("eof".into()).is_retryable());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = TransportError::Status(429);
        assert_eq!(err.to_string(), "unexpected status 429");
    }
}
