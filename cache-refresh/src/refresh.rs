//! The refresh operation: builder plus locked read-compute-write cycle.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument};

use cache_refresh_core::error::{CacheError, Result};
use cache_refresh_core::{CacheStore, Expiration, Expire, RefreshConfig};

use crate::decision::Decision;

/// Refresh callback: receives the current value and the expiration control,
/// returns the value to store (or `None` to store nothing).
pub type Callback<'a, V> = Box<dyn FnMut(Option<V>, &mut Expire) -> Option<V> + 'a>;

/// A refresh of one cache key.
///
/// Created per refresh request, configured through the chainable `lock`,
/// `wait_for` and `ttl` methods, then run with [`Refresh::put`]. Running it
/// again is allowed; each run reads the lock settings as they are at that
/// moment.
///
/// # Locking
///
/// If the store has a lock provider the cycle runs under the configured lock
/// and fails with [`CacheError::LockTimeout`] when the lock cannot be taken in
/// time. Without one, the refresh is a plain get-then-write and concurrent
/// refreshers of the same key can overwrite each other.
pub struct Refresh<'a, S: ?Sized, V> {
    store: &'a S,
    key: String,
    ttl: Expiration,
    name: String,
    seconds: u64,
    owner: Option<String>,
    wait: u64,
    callback: Option<Callback<'a, V>>,
}

impl<'a, S, V> Refresh<'a, S, V>
where
    S: CacheStore<V> + ?Sized,
    V: Clone,
{
    /// Creates a refresh of `key` with the default configuration.
    pub fn new(store: &'a S, key: impl Into<String>) -> Self {
        Self::with_config(store, key, &RefreshConfig::default())
    }

    /// Creates a refresh of `key` seeded from `config`.
    pub fn with_config(store: &'a S, key: impl Into<String>, config: &RefreshConfig) -> Self {
        let key = key.into();

        Self {
            store,
            name: config.lock_name(&key),
            key,
            ttl: Expiration::Never,
            seconds: config.lock_seconds,
            owner: None,
            wait: config.wait_seconds,
            callback: None,
        }
    }

    /// Changes the lock configuration. `None` keeps the current hold time or owner.
    pub fn lock(
        &mut self,
        name: impl Into<String>,
        seconds: Option<u64>,
        owner: Option<&str>,
    ) -> &mut Self {
        self.name = name.into();
        self.seconds = seconds.unwrap_or(self.seconds);
        if let Some(owner) = owner {
            self.owner = Some(owner.to_owned());
        }
        self
    }

    /// Sets the seconds to wait to acquire the lock.
    pub fn wait_for(&mut self, seconds: u64) -> &mut Self {
        self.wait = seconds;
        self
    }

    /// Sets the default expiration handed to the callback.
    pub fn ttl(&mut self, ttl: impl Into<Expiration>) -> &mut Self {
        self.ttl = ttl.into();
        self
    }

    /// Sets the refresh callback without running it.
    pub fn using<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(Option<V>, &mut Expire) -> Option<V> + 'a,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Retrieves and refreshes the key through `callback`.
    ///
    /// A `ttl` overrides the default expiration; `None` keeps it. Returns the
    /// callback's result, whether or not it was stored.
    pub fn put<F>(&mut self, callback: F, ttl: Option<Expiration>) -> Result<Option<V>>
    where
        F: FnMut(Option<V>, &mut Expire) -> Option<V> + 'a,
    {
        self.using(callback);
        if let Some(ttl) = ttl {
            self.ttl = ttl;
        }
        self.execute()
    }

    /// Runs the refresh with the callback set by [`Refresh::using`].
    #[instrument(skip(self), fields(key = %self.key, lock = %self.name))]
    pub fn execute(&mut self) -> Result<Option<V>> {
        if self.key.is_empty() {
            return Err(CacheError::InvalidConfiguration(
                "refresh key must not be empty".into(),
            ));
        }
        if self.callback.is_none() {
            return Err(CacheError::InvalidConfiguration(format!(
                "no refresh callback set for '{}'",
                self.key
            )));
        }

        let store = self.store;

        let Some(provider) = store.lock_provider() else {
            debug!("Store has no lock provider, refreshing unlocked");
            return self.refresh();
        };

        let lock = provider.lock(&self.name, self.seconds, self.owner.as_deref());
        debug!(owner = lock.owner(), seconds = self.seconds, wait = self.wait, "Blocking on refresh lock");

        let mut result = None;
        lock.block(Duration::from_secs(self.wait), &mut || {
            result = Some(self.refresh()?);
            Ok(())
        })?;

        Ok(result.flatten())
    }

    /// Read, run the callback, then write, forget, or skip.
    fn refresh(&mut self) -> Result<Option<V>> {
        let mut expire = Expire::new(self.ttl);

        let item = self.store.get(&self.key)?;
        let existed = item.is_some();

        let callback = self.callback.as_mut().ok_or_else(|| {
            CacheError::InvalidConfiguration(format!("no refresh callback set for '{}'", self.key))
        })?;
        let result = callback(item, &mut expire);

        let decision = Decision::new(existed, result.is_some(), expire.expiration(), Utc::now());
        debug!(existed, stored = result.is_some(), ?decision, "Refresh callback returned");

        match (decision, &result) {
            (Decision::Forget, _) => {
                self.store.forget(&self.key)?;
            }
            (Decision::Put(ttl), Some(value)) => self.store.put(&self.key, value.clone(), ttl)?,
            (Decision::Forever, Some(value)) => self.store.forever(&self.key, value.clone())?,
            _ => {}
        }

        Ok(result)
    }

    /// Key being refreshed.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name of the refresh lock.
    pub fn lock_name(&self) -> &str {
        &self.name
    }

    /// Seconds the lock is held once acquired.
    pub fn lock_seconds(&self) -> u64 {
        self.seconds
    }

    /// Owner token, if one was configured.
    pub fn lock_owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Seconds to wait for the lock.
    pub fn wait_seconds(&self) -> u64 {
        self.wait
    }

    /// Default expiration handed to the callback.
    pub fn default_ttl(&self) -> Expiration {
        self.ttl
    }
}

impl<S: ?Sized, V> fmt::Debug for Refresh<'_, S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refresh")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("name", &self.name)
            .field("seconds", &self.seconds)
            .field("owner", &self.owner)
            .field("wait", &self.wait)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
