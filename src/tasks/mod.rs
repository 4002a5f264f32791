//! Background Tasks Module
//!
//! Long-running tasks spawned by the cache coordinator.

mod sweep;

pub use sweep::spawn_sweep_task;
