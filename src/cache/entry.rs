//! Cache Entry Module
//!
//! Defines the in-memory form of a completed cache entry with TTL support.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CacheError;

// == Completed Entry ==
/// A finished, possibly stale, cache entry.
///
/// The payload is type-erased so entries of different value types can
/// share one state table; typed access goes through [`value_as`], which
/// fails with [`CacheError::InvalidType`] on mismatch. Within a process
/// lifetime the last writer's type wins for a key.
///
/// [`value_as`]: CompletedEntry::value_as
#[derive(Clone)]
pub struct CompletedEntry {
    /// The stored value
    value: Arc<dyn Any + Send + Sync>,
    /// Expiration timestamp (Unix milliseconds)
    expires_at: u64,
}

impl CompletedEntry {
    // == Constructor ==
    /// Creates an entry from an already erased value and an absolute
    /// expiration timestamp.
    pub fn new(value: Arc<dyn Any + Send + Sync>, expires_at: u64) -> Self {
        Self { value, expires_at }
    }

    /// Expiration timestamp (Unix milliseconds).
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to the expiration time, so a TTL of zero
    /// produces an entry that is stale the moment it is created.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

    // == Typed Access ==
    /// Downcasts the stored value to the requested type.
    ///
    /// # Arguments
    /// * `key` - The cache key, used only to label the error on mismatch
    pub fn value_as<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>, CacheError> {
        Arc::clone(&self.value)
            .downcast::<T>()
            .map_err(|_| CacheError::InvalidType(key.to_string()))
    }
}

impl fmt::Debug for CompletedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletedEntry")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

/// Returns the absolute expiration timestamp for a TTL starting now.
pub fn expiration_from_ttl(ttl: Duration) -> u64 {
    current_timestamp_ms() + ttl.as_millis() as u64
}
