//! Persistent Store Module
//!
//! Byte-oriented key-value storage consumed by the cache coordinator.
//! The coordinator never depends on a concrete backend; it sees only
//! the [`PersistentStore`] capability.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;

// == Persistent Store Trait ==
/// A durable byte-level key-value store.
///
/// Implementations own all backend-specific error handling for reads:
/// a read fault is logged by the implementation and reported as absent,
/// because the coordinator treats any unreadable entry as a cache miss.
/// Write failures are surfaced so the coordinator can log them, but they
/// are never fatal to a cache lookup.
#[async_trait]
pub trait PersistentStore: Send + Sync + 'static {
    /// Returns the stored bytes for `key`, or `None` if absent.
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `bytes` under `key`, overwriting any previous value.
    async fn set_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Removes `key` from the store. Removing an absent key is not an error.
    async fn delete_bytes(&self, key: &str);
}
