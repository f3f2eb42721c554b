//! Codec trait and implementations for serializing/deserializing messages.
//!
//! Session envelopes, join hails and discovery traffic all go through a
//! [`Codec`]. The fixed sub-protocols in [`crate::wire`] do not: their byte
//! layout is part of the compatibility contract and is written by hand.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` so one instance can live inside a session that is
/// moved to the thread running the pump.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do not
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Readable on the wire, which makes captured traffic easy to inspect.
///
/// ```rust
/// use netlobby_protocol::{Codec, Envelope, JsonCodec, SessionMessage};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::system(1, SessionMessage::GameStarted);
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
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
    use crate::{GamerProfile, JoinRequest};

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<JoinRequest, _> = JsonCodec.decode(b"\x00\x01 nope");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_join_request_survives_codec() {
        let request = JoinRequest {
            gamers: vec![GamerProfile::new("Ada", "ada#1")],
        };
        let bytes = JsonCodec.encode(&request).unwrap();
        let decoded: JoinRequest = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, request);
    }
}
