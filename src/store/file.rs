//! File Store
//!
//! A [`PersistentStore`] that writes each entry to its own file under a
//! configured directory. File names are the hex-encoded SHA-256 of the
//! cache key, so arbitrary key strings never leak into file system paths.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::StoreError;
use crate::store::PersistentStore;

// == File Store ==
/// Directory-backed byte store, one file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Returns the file path holding `key`.
    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.cache", hex::encode(digest)))
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key = %key, path = %path.display(), error = %err, "Failed to read cache file");
                None
            }
        }
    }

    async fn set_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        tokio::fs::write(self.path_for(key), bytes).await?;
        Ok(())
    }

    async fn delete_bytes(&self, key: &str) {
        let path = self.path_for(key);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            if err.kind() != ErrorKind::NotFound {
                warn!(key = %key, path = %path.display(), error = %err, "Failed to remove cache file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_set_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        store.set_bytes("key1", b"value1".to_vec()).await.unwrap();
        assert_eq!(store.get_bytes("key1").await, Some(b"value1".to_vec()));
    }

    #[tokio::test]
    async fn test_file_store_get_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        assert!(store.get_bytes("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_file_store_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        store.set_bytes("key1", b"value1".to_vec()).await.unwrap();
        store.delete_bytes("key1").await;

        assert!(store.get_bytes("key1").await.is_none());

        // Deleting an absent key is a no-op
        store.delete_bytes("key1").await;
    }

    #[tokio::test]
    async fn test_file_store_key_hashing_keeps_paths_safe() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        // Keys containing path separators must not escape the store directory
        store
            .set_bytes("memocache:../../etc/passwd", b"data".to_vec())
            .await
            .unwrap();

        assert_eq!(
            store.get_bytes("memocache:../../etc/passwd").await,
            Some(b"data".to_vec())
        );

        let mut files = std::fs::read_dir(dir.path()).unwrap();
        let entry = files.next().unwrap().unwrap();
        assert!(entry.file_name().to_string_lossy().ends_with(".cache"));
        assert!(files.next().is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::new(dir.path()).await.unwrap();
            store.set_bytes("key1", b"value1".to_vec()).await.unwrap();
        }

        let reopened = FileStore::new(dir.path()).await.unwrap();
        assert_eq!(reopened.get_bytes("key1").await, Some(b"value1".to_vec()));
    }
}
