//! Expiration Sweep Task
//!
//! Background task that periodically evicts expired cache entries from
//! the in-memory state table and the persistent store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::StateTable;
use crate::store::PersistentStore;

/// Spawns a background task that periodically removes expired entries.
///
/// The task runs in an infinite loop, sleeping for the configured
/// interval between sweeps. Each sweep removes expired completed entries
/// from the state table and then deletes the same keys from the
/// persistent store. In-flight computations are never touched regardless
/// of how long they have been running.
///
/// # Arguments
/// * `table` - Shared key state table
/// * `store` - Persistent store to evict swept keys from
/// * `sweep_interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task. Aborting the handle stops the
/// sweep promptly; a sweep already in progress finishes its current
/// pass.
pub fn spawn_sweep_task(
    table: Arc<Mutex<StateTable>>,
    store: Arc<dyn PersistentStore>,
    sweep_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiration sweep task with interval of {:?}", sweep_interval);

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(sweep_interval).await;

            // Expired entries leave the table synchronously; the store
            // deletions happen outside the table lock
            let expired = {
                let mut table = table.lock().expect("state table lock poisoned");
                table.take_expired()
            };

            for key in &expired {
                store.delete_bytes(key).await;
            }

            if !expired.is_empty() {
                info!("Expiration sweep: removed {} expired entries", expired.len());
            } else {
                debug!("Expiration sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::{current_timestamp_ms, expiration_from_ttl, CompletedEntry, KeyState};
    use crate::store::MemoryStore;

    fn completed(expires_at: u64) -> CompletedEntry {
        CompletedEntry::new(Arc::new("value".to_string()), expires_at)
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let table = Arc::new(Mutex::new(StateTable::new()));
        let store = Arc::new(MemoryStore::new());

        {
            let mut table = table.lock().unwrap();
            table.insert_completed("expire_soon".to_string(), completed(current_timestamp_ms()));
        }
        store
            .set_bytes("expire_soon", b"envelope".to_vec())
            .await
            .unwrap();

        let handle = spawn_sweep_task(table.clone(), store.clone(), Duration::from_millis(50));

        // Wait for at least one sweep to run
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(table.lock().unwrap().is_empty(), "Expired entry should be swept");
        assert!(store.is_empty().await, "Swept entry should leave the store");

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_valid_entries() {
        let table = Arc::new(Mutex::new(StateTable::new()));
        let store = Arc::new(MemoryStore::new());

        {
            let mut table = table.lock().unwrap();
            table.insert_completed(
                "long_lived".to_string(),
                completed(expiration_from_ttl(Duration::from_secs(3600))),
            );
        }
        store
            .set_bytes("long_lived", b"envelope".to_vec())
            .await
            .unwrap();

        let handle = spawn_sweep_task(table.clone(), store.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(table.lock().unwrap().len(), 1, "Valid entry should survive sweeps");
        assert_eq!(store.len().await, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_never_touches_in_progress() {
        use crate::cache::{ComputationResult, InFlight};
        use futures::FutureExt;

        let table = Arc::new(Mutex::new(StateTable::new()));
        let store = Arc::new(MemoryStore::new());

        {
            let mut table = table.lock().unwrap();
            table.begin(
                "still_running".to_string(),
                InFlight {
                    generation: 1,
                    // A computation that never finishes
                    handle: futures::future::pending::<ComputationResult>().boxed().shared(),
                },
            );
        }

        let handle = spawn_sweep_task(table.clone(), store, Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(150)).await;

        let table = table.lock().unwrap();
        assert!(
            matches!(table.lookup("still_running"), Some(KeyState::InProgress(_))),
            "In-flight computations must never be swept"
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let table = Arc::new(Mutex::new(StateTable::new()));
        let store = Arc::new(MemoryStore::new());

        let handle = spawn_sweep_task(table, store, Duration::from_millis(20));

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
