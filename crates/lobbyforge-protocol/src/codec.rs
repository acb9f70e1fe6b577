//! Codec trait and the JSON implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts messages to bytes and back.
///
/// The server is generic over its codec so a compact binary format can
/// replace JSON without touching the connection handler.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`. Human-readable, easy to poke at
/// from a browser console.
///
/// ```rust
/// use lobbyforge_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ClientMessage::RequestSession).unwrap();
/// assert_eq!(bytes, br#"{"type":"RequestSession"}"#);
/// let back: ClientMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(back, ClientMessage::RequestSession);
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
