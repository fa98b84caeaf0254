//! Async coordination primitives
//!
//! - **[`keyed_lock`]**: per-key async mutexes for serializing work on one
//!   entity while letting other entities proceed

pub mod keyed_lock;

pub use keyed_lock::{KeyedGuard, KeyedLocks};
