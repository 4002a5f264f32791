//! Key State Table Module
//!
//! The in-memory mapping from cache key to per-key state. This table is
//! the single source of truth for concurrency control: all transitions
//! happen under one mutex, which makes the check-then-register sequence
//! for in-flight computations atomic.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};

use crate::cache::CompletedEntry;
use crate::error::CacheError;

// == Shared Computation Handle ==
/// The type-erased outcome of a computation, cloned to every waiter.
pub type ComputationResult = Result<Arc<dyn Any + Send + Sync>, CacheError>;

/// A joinable handle to an in-flight computation. Every concurrent
/// caller awaits a clone of the same shared future and observes the same
/// resolved value or failure.
pub type SharedComputation = Shared<BoxFuture<'static, ComputationResult>>;

// == In-Flight Computation ==
/// A computation currently running for a key.
#[derive(Clone)]
pub struct InFlight {
    /// Identity of this computation; completion and abandonment only
    /// apply when the table still holds the same generation.
    pub generation: u64,
    /// The joinable result handle.
    pub handle: SharedComputation,
}

// == Key State ==
/// Per-key cache state. A key with no entry in the table is absent.
pub enum KeyState {
    /// A computation is running; waiters join its handle
    InProgress(InFlight),
    /// A finished, possibly stale result
    Completed(CompletedEntry),
}

// == State Table ==
/// Mapping from namespaced cache key to [`KeyState`].
#[derive(Default)]
pub struct StateTable {
    entries: HashMap<String, KeyState>,
}

impl StateTable {
    // == Constructor ==
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    // == Lookup ==
    /// Returns the current state for a key, if any.
    pub fn lookup(&self, key: &str) -> Option<&KeyState> {
        self.entries.get(key)
    }

    // == Begin ==
    /// Installs an in-flight computation for a key.
    ///
    /// Replaces whatever was there before; callers decide under the table
    /// lock whether the previous state (a live value or another in-flight
    /// computation) should instead be served.
    pub fn begin(&mut self, key: String, inflight: InFlight) {
        self.entries.insert(key, KeyState::InProgress(inflight));
    }

    // == Insert Completed ==
    /// Stores a completed entry for a key, e.g. when warming memory from
    /// the persistent store.
    pub fn insert_completed(&mut self, key: String, entry: CompletedEntry) {
        self.entries.insert(key, KeyState::Completed(entry));
    }

    // == Complete ==
    /// Transitions a key from `InProgress` to `Completed`.
    ///
    /// Only applies when the key still holds the in-flight computation of
    /// the given generation. A `delete` or a newer generation racing the
    /// completion wins; the late result is returned to its joined waiters
    /// but not cached. Returns whether the entry was stored.
    pub fn complete(&mut self, key: &str, generation: u64, entry: CompletedEntry) -> bool {
        match self.entries.get(key) {
            Some(KeyState::InProgress(inflight)) if inflight.generation == generation => {
                self.entries.insert(key.to_string(), KeyState::Completed(entry));
                true
            }
            _ => false,
        }
    }

    // == Abandon ==
    /// Removes an in-flight computation after it failed, returning the
    /// key to absent so the next lookup starts a fresh attempt. Failures
    /// are never cached.
    pub fn abandon(&mut self, key: &str, generation: u64) {
        if let Some(KeyState::InProgress(inflight)) = self.entries.get(key) {
            if inflight.generation == generation {
                self.entries.remove(key);
            }
        }
    }

    // == Remove ==
    /// Unconditionally removes a key, regardless of state.
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    // == Take Expired ==
    /// Removes all expired completed entries and returns their keys.
    ///
    /// In-flight computations are never selected regardless of age; a
    /// long-running computation must not be forgotten mid-flight.
    pub fn take_expired(&mut self) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter_map(|(key, state)| match state {
                KeyState::Completed(entry) if entry.is_expired() => Some(key.clone()),
                _ => None,
            })
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }

        expired
    }

    // == Length ==
    /// Returns the current number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
