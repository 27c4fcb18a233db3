//! `refresh` entry point on every cache store.

use cache_refresh_core::error::Result;
use cache_refresh_core::{CacheStore, Expiration, Expire};

use crate::refresh::Refresh;

/// Adds `refresh` to every [`CacheStore`].
///
/// Refreshing is not atomic on stores without a lock provider.
pub trait RefreshExt<V>: CacheStore<V> {
    /// Starts a refresh of `key`, to be configured and then run with
    /// [`Refresh::put`].
    fn refresh(&self, key: impl Into<String>) -> Refresh<'_, Self, V>
    where
        V: Clone,
    {
        Refresh::new(self, key)
    }

    /// Refreshes `key` through `callback` with the default lock settings,
    /// optionally with a new default expiration.
    fn refresh_with<'a, F>(
        &'a self,
        key: impl Into<String>,
        callback: F,
        ttl: Option<Expiration>,
    ) -> Result<Option<V>>
    where
        V: Clone,
        F: FnMut(Option<V>, &mut Expire) -> Option<V> + 'a,
    {
        Refresh::new(self, key).put(callback, ttl)
    }
}

impl<V, S: CacheStore<V> + ?Sized> RefreshExt<V> for S {}
