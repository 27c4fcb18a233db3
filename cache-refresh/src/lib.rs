//! # cache-refresh
//!
//! Atomic read-compute-write refresh of a single cache key.
//!
//! A [`Refresh`] reads the current value, hands it to a callback together with
//! an [`Expire`] control, and then stores, forgets, or leaves the key alone
//! depending on what the callback returned and how it set the expiration.
//!
//! When the store exposes a [`LockProvider`](cache_refresh_core::LockProvider),
//! the whole cycle runs under a named lock (`"<key>:refresh"` by default).
//! Stores without one get no serialization: concurrent refreshes of the same
//! key interleave and the last writer wins.
//!
//! ## Example
//!
//! ```rust
//! use cache_refresh::{Expiration, RefreshExt};
//! use cache_refresh_store::MemoryStore;
//!
//! let store = MemoryStore::<u32>::new();
//!
//! let visits = store.refresh_with("visits", |count, _expire| {
//!     Some(count.unwrap_or(0) + 1)
//! }, None)?;
//! assert_eq!(visits, Some(1));
//!
//! let visits = store
//!     .refresh("visits")
//!     .lock("visits:lock", Some(5), None)
//!     .wait_for(2)
//!     .put(|count, expire| {
//!         expire.at(Expiration::seconds(900));
//!         count.map(|count| count + 1)
//!     }, None)?;
//! assert_eq!(visits, Some(2));
//! # Ok::<(), cache_refresh::CacheError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod decision;
mod ext;
mod refresh;

#[cfg(test)]
mod mock;

pub use decision::Decision;
pub use ext::RefreshExt;
pub use refresh::{Callback, Refresh};

pub use cache_refresh_core::{CacheError, CacheStore, Expiration, Expire, RefreshConfig, Result};
