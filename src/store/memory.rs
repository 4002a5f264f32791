//! In-Memory Store
//!
//! A process-local [`PersistentStore`] backed by a HashMap. Useful as a
//! default backend in tests and for simulating process restarts by
//! sharing one store across coordinator instances.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::PersistentStore;

// == Memory Store ==
/// HashMap-backed byte store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete_bytes(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_and_get() {
        let store = MemoryStore::new();

        store.set_bytes("key1", b"value1".to_vec()).await.unwrap();
        let bytes = store.get_bytes("key1").await;

        assert_eq!(bytes, Some(b"value1".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_get_absent() {
        let store = MemoryStore::new();
        assert!(store.get_bytes("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_overwrite() {
        let store = MemoryStore::new();

        store.set_bytes("key1", b"old".to_vec()).await.unwrap();
        store.set_bytes("key1", b"new".to_vec()).await.unwrap();

        assert_eq!(store.get_bytes("key1").await, Some(b"new".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryStore::new();

        store.set_bytes("key1", b"value1".to_vec()).await.unwrap();
        store.delete_bytes("key1").await;

        assert!(store.get_bytes("key1").await.is_none());
        assert!(store.is_empty().await);

        // Deleting an absent key is a no-op
        store.delete_bytes("key1").await;
    }
}
