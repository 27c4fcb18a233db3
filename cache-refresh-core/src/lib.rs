//! # cache-refresh core
//!
//! Core types, errors, and traits shared by every cache-refresh crate:
//!
//! - **Expiration**: the TTL a refreshed value is stored under, and the
//!   [`Expire`] control handed to refresh callbacks
//! - **Traits**: the [`CacheStore`] a refresh runs against and the optional
//!   [`LockProvider`] / [`Lock`] capability that serializes refreshers
//! - **Errors**: [`CacheError`] and the crate-wide [`Result`] alias
//! - **Config**: [`RefreshConfig`] defaults for lock naming and waiting
//!
//! ## Example
//!
//! ```rust
//! use cache_refresh_core::{Expiration, Expire};
//!
//! let mut expire = Expire::new(Expiration::seconds(90));
//! expire.at(Expiration::seconds(60));
//! assert_eq!(expire.expiration(), Expiration::seconds(60));
//!
//! expire.now();
//! assert!(expire.expiration().is_now());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod expire;
pub mod traits;

pub use config::RefreshConfig;
pub use constants::*;
pub use error::{CacheError, Result};
pub use expire::{Expiration, Expire};
pub use traits::{CacheStore, Lock, LockProvider};
