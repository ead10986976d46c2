//! Unified error type for boardcast.

use boardcast_client::ClientError;
use boardcast_protocol::ProtocolError;
use boardcast_session::{SessionError, SessionId};
use boardcast_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// `#[from]` on each wrapped variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum BoardcastError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The config file is unreadable, malformed, or has invalid values.
    #[error("configuration error: {0}")]
    Config(String),

    /// A signaling message was missing a field.
    #[error("invalid signaling message: {0}")]
    Signal(String),

    /// The session exists but its task has stopped.
    #[error("session {0} is no longer running")]
    SessionGone(SessionId),
}

impl BoardcastError {
    /// Whether the error was caused by the caller rather than by the
    /// upstream service or the gateway itself.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::Client(
                ClientError::Busy(_)
                    | ClientError::QueueFull(_)
                    | ClientError::NoActiveGame
                    | ClientError::StreamActive
                    | ClientError::Protocol(ProtocolError::InvalidMessage(_))
            ) | Self::Session(SessionError::NotFound(_))
                | Self::Signal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: BoardcastError = TransportError::Connect("refused".into()).into();
        assert!(matches!(err, BoardcastError::Transport(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_from_session_error_capacity() {
        let err: BoardcastError = SessionError::CapacityExceeded { max: 3 }.into();
        assert!(matches!(err, BoardcastError::Session(_)));
        assert!(!err.is_usage());
    }

    #[test]
    fn test_is_usage_for_unknown_session() {
        let err: BoardcastError = SessionError::NotFound(SessionId::new("x")).into();
        assert!(err.is_usage());
    }
}
