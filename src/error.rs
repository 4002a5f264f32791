//! Error types for the memoization cache
//!
//! Provides unified error handling using thiserror.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type surfaced by the cache coordinator.
///
/// Only computation and type errors cross the coordinator boundary;
/// persistence faults ([`StoreError`], [`CodecError`]) are absorbed
/// internally and degrade to cache misses or logged warnings.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The supplied key violates the key contract (empty or oversized)
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The cached or in-flight value does not match the requested type
    #[error("Type mismatch for cached key: {0}")]
    InvalidType(String),

    /// The caller-supplied computation failed
    #[error("Computation failed: {0}")]
    ComputationFailed(#[source] ComputeError),
}

// == Compute Error ==
/// A computation failure shared by every caller joined to the same
/// in-flight computation.
///
/// Wraps the underlying [`anyhow::Error`] in an [`Arc`] so all waiters
/// observe the same failure without requiring the error to be cloneable.
#[derive(Debug, Clone)]
pub struct ComputeError(Arc<anyhow::Error>);

impl ComputeError {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// Returns the underlying error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ComputeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let inner: &(dyn std::error::Error + 'static) = self.0.as_ref().as_ref();
        Some(inner)
    }
}

// == Store Error Enum ==
/// Failures reported by a persistent store write.
///
/// Write failures never reach the caller of `get`; persistence is
/// best-effort and in-memory cache correctness does not depend on it.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

// == Codec Error Enum ==
/// Failures encoding or decoding a persisted cache entry.
///
/// Decode failures are treated as a cache miss by the coordinator;
/// encode failures are logged and the entry is simply not persisted.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Failed to serialize an entry for persistence
    #[error("Failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failed to deserialize a persisted entry
    #[error("Failed to decode cache entry: {0}")]
    Decode(#[source] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
