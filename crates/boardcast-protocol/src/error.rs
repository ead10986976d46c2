//! Error types for the protocol layer.
//!
//! A `ProtocolError` means the server was reached and answered, but the
//! answer was not what the game protocol expects: a non-2xx status, a
//! body that does not decode, or an explicit business rejection. None of
//! these are retried automatically.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A response body did not match the expected shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A value violates protocol rules before anything is sent, such as
    /// an AI level outside `1..=8` or a malformed move.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The server answered with a non-success status.
    ///
    /// `body` holds the server's explanation when it sent one.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The server accepted the call but refused the operation, e.g. a
    /// move acknowledgement with `ok: false`.
    #[error("rejected: {0}")]
    Rejected(String),
}
