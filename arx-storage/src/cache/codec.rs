//! Payload codec abstraction.
//!
//! Tiers store opaque byte payloads; a [`PayloadCodec`] converts typed
//! values to and from those bytes. The codec is injected into
//! [`TypedCache`](super::typed::TypedCache) so the serialization format
//! can be swapped without touching tier code.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Error produced by a codec while encoding or decoding a payload.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Converts typed values to and from raw cache payloads.
pub trait PayloadCodec: Send + Sync {
    /// Serializes a value into the byte payload stored in a tier.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes a byte payload fetched from a tier.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec backed by `serde_json`.
///
/// Payloads written through this codec are plain JSON documents, so objects
/// persisted by the durable tier stay readable with standard tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
