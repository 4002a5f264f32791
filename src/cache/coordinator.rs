//! Cache Coordinator Module
//!
//! Public entry point of the cache. On each lookup the coordinator
//! serves a live completed value, joins an already in-flight
//! computation, or registers and spawns a new one; completed results
//! are persisted best-effort to the configured store.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cache::state::{ComputationResult, InFlight, KeyState, SharedComputation, StateTable};
use crate::cache::{
    current_timestamp_ms, expiration_from_ttl, namespaced_key, CompletedEntry, MAX_KEY_LENGTH,
};
use crate::codec;
use crate::config::CacheConfig;
use crate::error::{CacheError, ComputeError, Result};
use crate::store::PersistentStore;
use crate::tasks::spawn_sweep_task;

// == Cache Coordinator ==
/// An async memoization cache with TTL expiration, single-flight
/// deduplication and best-effort durable persistence.
///
/// Concurrent lookups for the same key share one refresh computation;
/// every joined caller observes the same resolved value or the same
/// failure. Failures are never cached. Completed values are written to
/// the persistent store so an unexpired entry survives a process
/// restart.
///
/// Construction spawns the background expiration sweeper, so a
/// coordinator must be created inside a tokio runtime. Dropping the
/// coordinator stops the sweeper.
pub struct MemoCache {
    /// Per-key state, guarded by a single mutex
    table: Arc<Mutex<StateTable>>,
    /// Durable byte store for completed entries
    store: Arc<dyn PersistentStore>,
    /// Stamps each spawned computation with a unique identity
    generations: AtomicU64,
    /// Background expiration sweeper, aborted on drop
    sweep_handle: JoinHandle<()>,
}

impl MemoCache {
    // == Constructors ==
    /// Creates a coordinator over `store` with the default configuration.
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Creates a coordinator over `store` with an explicit configuration.
    pub fn with_config(store: Arc<dyn PersistentStore>, config: CacheConfig) -> Self {
        let table = Arc::new(Mutex::new(StateTable::new()));
        let sweep_handle =
            spawn_sweep_task(Arc::clone(&table), Arc::clone(&store), config.sweep_interval);

        Self {
            table,
            store,
            generations: AtomicU64::new(0),
            sweep_handle,
        }
    }

    // == Get ==
    /// Returns the cached value for `key`, refreshing it with `compute`
    /// when absent or expired.
    ///
    /// `compute` is invoked at most once per freshness window; concurrent
    /// callers for the same key join the in-flight computation instead of
    /// starting their own. A TTL of zero means the result is never
    /// reusable: every call recomputes, but concurrent callers still
    /// share one computation.
    ///
    /// # Errors
    /// - [`CacheError::InvalidKey`] if `key` is empty or oversized
    /// - [`CacheError::InvalidType`] if the value cached under `key` has
    ///   a different type than `T`
    /// - [`CacheError::ComputationFailed`] if `compute` fails; the
    ///   failure is propagated to every joined caller and never cached
    pub async fn get<T, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        validate_key(key)?;
        let cache_key = namespaced_key(key);

        // Fast path: serve from memory or join an in-flight computation.
        let joined = {
            let table = self.table.lock().expect("state table lock poisoned");
            match table.lookup(&cache_key) {
                Some(KeyState::InProgress(inflight)) => Some(inflight.handle.clone()),
                Some(KeyState::Completed(entry)) if !entry.is_expired() => {
                    return entry.value_as::<T>(&cache_key);
                }
                _ => None,
            }
        };
        if let Some(handle) = joined {
            return Self::resolve::<T>(handle.await, &cache_key);
        }

        // Memory miss: an unexpired entry may survive in the persistent
        // store from a previous process. Decode failures degrade to a
        // miss.
        let warmed = self.load_persistent::<T>(&cache_key).await;

        // Re-check and register under one lock acquisition; another
        // caller may have raced us while the store read was in flight.
        let handle = {
            let mut table = self.table.lock().expect("state table lock poisoned");
            match table.lookup(&cache_key) {
                Some(KeyState::InProgress(inflight)) => inflight.handle.clone(),
                Some(KeyState::Completed(entry)) if !entry.is_expired() => {
                    return entry.value_as::<T>(&cache_key);
                }
                _ => {
                    if let Some((value, expires_at)) = warmed {
                        let erased: Arc<dyn Any + Send + Sync> = value.clone();
                        table.insert_completed(
                            cache_key.clone(),
                            CompletedEntry::new(erased, expires_at),
                        );
                        return Ok(value);
                    }

                    let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                    let handle =
                        self.spawn_computation(cache_key.clone(), ttl, generation, compute());
                    table.begin(
                        cache_key.clone(),
                        InFlight {
                            generation,
                            handle: handle.clone(),
                        },
                    );
                    handle
                }
            }
        };

        Self::resolve::<T>(handle.await, &cache_key)
    }

    // == Delete ==
    /// Removes `key` from the in-memory table and the persistent store,
    /// regardless of its current state.
    ///
    /// An in-flight computation is not cancelled; callers already joined
    /// to it still receive its result, but that result is no longer
    /// cached or persisted.
    pub async fn delete(&self, key: &str) {
        let cache_key = namespaced_key(key);
        self.table
            .lock()
            .expect("state table lock poisoned")
            .remove(&cache_key);
        self.store.delete_bytes(&cache_key).await;
    }

    // == Length ==
    /// Returns the number of keys currently tracked in memory, counting
    /// both in-flight computations and completed entries.
    pub fn len(&self) -> usize {
        self.table.lock().expect("state table lock poisoned").len()
    }

    /// Returns true if no key is currently tracked in memory.
    pub fn is_empty(&self) -> bool {
        self.table
            .lock()
            .expect("state table lock poisoned")
            .is_empty()
    }

    // == Computation Spawning ==
    /// Spawns `computation` as an independent task and returns the
    /// shared handle that waiters join.
    ///
    /// The task runs to completion even if every waiter is cancelled. On
    /// success it transitions the table entry and persists the encoded
    /// result; on failure (including a panic) it abandons the in-flight
    /// entry so the next lookup starts fresh. Both transitions apply only
    /// while the table still holds this computation's generation.
    fn spawn_computation<T, Fut>(
        &self,
        cache_key: String,
        ttl: Duration,
        generation: u64,
        computation: Fut,
    ) -> SharedComputation
    where
        T: Serialize + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let table = Arc::clone(&self.table);
        let store = Arc::clone(&self.store);

        let task: JoinHandle<ComputationResult> = tokio::spawn(async move {
            match AssertUnwindSafe(computation).catch_unwind().await {
                Ok(Ok(value)) => {
                    let value = Arc::new(value);
                    let expires_at = expiration_from_ttl(ttl);
                    let encoded = codec::encode(value.as_ref(), expires_at);
                    let erased: Arc<dyn Any + Send + Sync> = value.clone();

                    let cached = {
                        let mut table = table.lock().expect("state table lock poisoned");
                        table.complete(
                            &cache_key,
                            generation,
                            CompletedEntry::new(Arc::clone(&erased), expires_at),
                        )
                    };

                    // Persist only when the result was actually cached; a
                    // delete racing the computation must not be
                    // resurrected from storage.
                    if cached {
                        match encoded {
                            Ok(bytes) => {
                                if let Err(err) = store.set_bytes(&cache_key, bytes).await {
                                    warn!(
                                        "Failed to persist cache entry for {}: {}",
                                        cache_key, err
                                    );
                                }
                            }
                            Err(err) => {
                                warn!("Failed to encode cache entry for {}: {}", cache_key, err);
                            }
                        }
                    }

                    Ok(erased)
                }
                Ok(Err(err)) => {
                    table
                        .lock()
                        .expect("state table lock poisoned")
                        .abandon(&cache_key, generation);
                    Err(CacheError::ComputationFailed(ComputeError::new(err)))
                }
                Err(panic) => {
                    table
                        .lock()
                        .expect("state table lock poisoned")
                        .abandon(&cache_key, generation);
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    Err(CacheError::ComputationFailed(ComputeError::new(anyhow!(
                        "computation panicked: {reason}"
                    ))))
                }
            }
        });

        task.map(|joined| match joined {
            Ok(result) => result,
            Err(err) => Err(CacheError::ComputationFailed(ComputeError::new(
                anyhow::Error::new(err),
            ))),
        })
        .boxed()
        .shared()
    }

    // == Persistent Lookup ==
    /// Loads and decodes an unexpired entry from the persistent store.
    ///
    /// Any fault on this path (read error, undecodable bytes, elapsed
    /// expiration) yields `None`: the store never makes a lookup fail, it
    /// can only make it cheaper.
    async fn load_persistent<T>(&self, cache_key: &str) -> Option<(Arc<T>, u64)>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let bytes = self.store.get_bytes(cache_key).await?;

        let (value, expires_at) = match codec::decode::<T>(&bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("Discarding undecodable persisted entry for {}: {}", cache_key, err);
                return None;
            }
        };

        if current_timestamp_ms() >= expires_at {
            return None;
        }

        Some((Arc::new(value), expires_at))
    }

    // == Result Resolution ==
    /// Downcasts a shared computation outcome to the caller's type.
    fn resolve<T: Send + Sync + 'static>(
        result: ComputationResult,
        cache_key: &str,
    ) -> Result<Arc<T>> {
        result?
            .downcast::<T>()
            .map_err(|_| CacheError::InvalidType(cache_key.to_string()))
    }
}

impl fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl Drop for MemoCache {
    fn drop(&mut self) {
        // No background activity may outlive the coordinator.
        self.sweep_handle.abort();
    }
}

// == Key Validation ==
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("Key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
