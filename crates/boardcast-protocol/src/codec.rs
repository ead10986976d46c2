//! Codec trait and implementations for response bodies.
//!
//! The state machine decodes every upstream body through a [`Codec`], so
//! the wire format is swappable in one place. [`JsonCodec`] is the only
//! format the service speaks today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `DeserializeOwned` keeps decoded values independent of the input
/// buffer, which is dropped right after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do
    /// not match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use boardcast_protocol::{Codec, CreatedGame, JsonCodec};
///
/// let created: CreatedGame = JsonCodec.decode(br#"{"id":"q7ZvsdUF"}"#).unwrap();
/// assert_eq!(created.id.as_str(), "q7ZvsdUF");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{MoveAck, GameId};

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let ack: MoveAck = JsonCodec.decode(br#"{"ok":true,"extra":1}"#).unwrap();
        assert!(ack.ok);
    }

    #[test]
    fn test_decode_missing_field_returns_decode_error() {
        let result: Result<MoveAck, _> = JsonCodec.decode(b"{}");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_game_id_is_bare_string() {
        let bytes = JsonCodec.encode(&GameId::new("abc")).unwrap();
        assert_eq!(bytes, br#""abc""#);
    }
}
