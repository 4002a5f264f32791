//! Entry Codec Module
//!
//! Encodes a typed value together with its expiration timestamp into the
//! byte envelope written to a persistent store, and back.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

// == Stored Entry Envelope ==
/// The persisted form of a completed cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry<T> {
    /// The cached payload
    value: T,
    /// Expiration timestamp (Unix milliseconds)
    expires_at: u64,
}

// == Encode ==
/// Serializes a value and its expiration timestamp into a byte envelope.
pub fn encode<T: Serialize>(value: &T, expires_at: u64) -> Result<Vec<u8>, CodecError> {
    let entry = StoredEntry { value, expires_at };
    serde_json::to_vec(&entry).map_err(CodecError::Encode)
}

// == Decode ==
/// Deserializes a byte envelope back into a value and its expiration
/// timestamp.
///
/// A failure here signals format drift or a value of a different type
/// under the same key; callers treat it as a cache miss.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, u64), CodecError> {
    let entry: StoredEntry<T> = serde_json::from_slice(bytes).map_err(CodecError::Decode)?;
    Ok((entry.value, entry.expires_at))
}
