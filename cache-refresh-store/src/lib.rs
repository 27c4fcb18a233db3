//! In-memory store for cache-refresh.
//!
//! Generic TTL store with call accounting and an optional in-process lock
//! provider.

mod lock;
mod memory;

pub use lock::MemoryLock;
pub use memory::{CallCounts, MemoryStore, StoreConfig, StoreStats};
