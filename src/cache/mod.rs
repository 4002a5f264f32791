//! Cache Module
//!
//! Per-key state coordination with TTL expiration and single-flight
//! deduplication of concurrent refreshes.

mod coordinator;
mod entry;
mod state;


// Re-export public types
pub use coordinator::MemoCache;
pub use entry::{current_timestamp_ms, expiration_from_ttl, CompletedEntry};
pub use state::{ComputationResult, InFlight, KeyState, SharedComputation, StateTable};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Prefix prepended to every logical key before it reaches the state
/// table or the persistent store, preventing collisions with unrelated
/// data in a shared store.
pub const KEY_NAMESPACE: &str = "memocache:";

// == Key Namespacing ==
/// Returns the namespaced form of a logical key.
pub fn namespaced_key(key: &str) -> String {
    format!("{KEY_NAMESPACE}{key}")
}
