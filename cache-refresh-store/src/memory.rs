//! In-memory TTL store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::TimeDelta;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use cache_refresh_core::error::Result;
use cache_refresh_core::{CacheStore, Lock, LockProvider, DEFAULT_LOCK_RETRY_MILLIS};

use crate::lock::{LockRecord, MemoryLock};

/// Stored value with optional expiry.
#[derive(Clone)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Whether the store hands out locks
    pub enable_locks: bool,
    /// Milliseconds between lock acquisition attempts
    pub lock_retry_millis: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enable_locks: true,
            lock_retry_millis: DEFAULT_LOCK_RETRY_MILLIS,
        }
    }
}

#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    puts: AtomicU64,
    forevers: AtomicU64,
    forgets: AtomicU64,
    locks: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Number of calls the store has received, per operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CallCounts {
    /// `get` calls
    pub gets: u64,
    /// `put` calls, including ones that dropped the key
    pub puts: u64,
    /// `forever` calls
    pub forevers: u64,
    /// `forget` calls
    pub forgets: u64,
    /// Lock handles created
    pub locks: u64,
}

impl CallCounts {
    /// put + forever + forget calls.
    pub fn mutations(&self) -> u64 {
        self.puts + self.forevers + self.forgets
    }

    /// Calls received since `earlier` was taken.
    pub fn since(&self, earlier: &CallCounts) -> CallCounts {
        CallCounts {
            gets: self.gets.saturating_sub(earlier.gets),
            puts: self.puts.saturating_sub(earlier.puts),
            forevers: self.forevers.saturating_sub(earlier.forevers),
            forgets: self.forgets.saturating_sub(earlier.forgets),
            locks: self.locks.saturating_sub(earlier.locks),
        }
    }
}

/// Snapshot of what a store currently holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Entries in the map, expired ones included
    pub total_entries: usize,
    /// Entries past their expiry that have not been overwritten yet
    pub expired_entries: usize,
    /// Entries a `get` would return
    pub valid_entries: usize,
    /// Locks currently held and not expired
    pub held_locks: usize,
}

/// In-memory key-value store for tests and demos.
///
/// Expired entries read as absent and are replaced on the next write. With
/// `enable_locks` set it is also a [`LockProvider`], so refreshes against it
/// are serialized within the process.
pub struct MemoryStore<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    locks: Arc<Mutex<HashMap<String, LockRecord>>>,
    config: StoreConfig,
    counters: Counters,
}

impl<V: Clone> MemoryStore<V> {
    /// Creates a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store that refuses to hand out locks.
    pub fn without_locks() -> Self {
        Self::with_config(StoreConfig {
            enable_locks: false,
            ..StoreConfig::default()
        })
    }

    /// Creates a store with custom configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: Arc::new(Mutex::new(HashMap::new())),
            config,
            counters: Counters::default(),
        }
    }

    fn insert(&self, key: &str, value: V, expires_at: Option<Instant>) {
        self.entries
            .write()
            .insert(key.to_owned(), Entry { value, expires_at });
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        let entries = self.entries.read();
        let expired = entries.values().filter(|e| e.is_expired()).count();
        StoreStats {
            total_entries: entries.len(),
            expired_entries: expired,
            valid_entries: entries.len() - expired,
            held_locks: self.locks.lock().values().filter(|l| !l.is_expired()).count(),
        }
    }

    /// Calls received so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            gets: self.counters.gets.load(Ordering::Relaxed),
            puts: self.counters.puts.load(Ordering::Relaxed),
            forevers: self.counters.forevers.load(Ordering::Relaxed),
            forgets: self.counters.forgets.load(Ordering::Relaxed),
            locks: self.counters.locks.load(Ordering::Relaxed),
        }
    }

    /// Returns true if `name` is held and has not expired.
    pub fn is_locked(&self, name: &str) -> bool {
        self.locks.lock().get(name).is_some_and(|l| !l.is_expired())
    }
}

impl<V: Clone> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CacheStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>> {
        Counters::bump(&self.counters.gets);
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.clone()))
    }

    #[instrument(skip(self, value))]
    fn put(&self, key: &str, value: V, ttl: TimeDelta) -> Result<()> {
        Counters::bump(&self.counters.puts);

        let Some(ttl) = ttl.to_std().ok().filter(|d| !d.is_zero()) else {
            debug!("Non-positive TTL, dropping key");
            self.entries.write().remove(key);
            return Ok(());
        };

        self.insert(key, value, Instant::now().checked_add(ttl));
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<bool> {
        Counters::bump(&self.counters.forgets);
        Ok(self.entries.write().remove(key).is_some())
    }

    fn forever(&self, key: &str, value: V) -> Result<()> {
        Counters::bump(&self.counters.forevers);
        self.insert(key, value, None);
        Ok(())
    }

    fn lock_provider(&self) -> Option<&dyn LockProvider> {
        if self.config.enable_locks {
            Some(self)
        } else {
            None
        }
    }
}

impl<V> LockProvider for MemoryStore<V>
where
    V: Send + Sync,
{
    fn lock(&self, name: &str, seconds: u64, owner: Option<&str>) -> Box<dyn Lock + '_> {
        Counters::bump(&self.counters.locks);
        Box::new(MemoryLock::new(
            Arc::clone(&self.locks),
            name,
            seconds,
            owner,
            Duration::from_millis(self.config.lock_retry_millis),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_refresh::{Expiration, RefreshExt};
    use cache_refresh_core::CacheError;

    #[test]
    fn test_store_forever_get() {
        let store = MemoryStore::new();
        store.forever("alice", "value".to_string()).unwrap();
        assert_eq!(store.get("alice").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_store_miss() {
        let store = MemoryStore::<String>::new();
        assert!(store.get("nobody").unwrap().is_none());
    }

    #[test]
    fn test_store_forget() {
        let store = MemoryStore::new();
        store.forever("alice", 1_u32).unwrap();
        assert!(store.forget("alice").unwrap());
        assert!(!store.forget("alice").unwrap());
        assert!(store.get("alice").unwrap().is_none());
    }

    #[test]
    fn test_store_ttl_expiration() {
        let store = MemoryStore::new();
        store.put("alice", 1_u32, TimeDelta::milliseconds(1)).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert!(store.get("alice").unwrap().is_none());
    }

    #[test]
    fn test_store_non_positive_ttl_drops_key() {
        let store = MemoryStore::new();
        store.forever("alice", 1_u32).unwrap();
        store.put("alice", 2, TimeDelta::seconds(-1)).unwrap();
        assert!(store.get("alice").unwrap().is_none());

        store.put("bob", 2, TimeDelta::zero()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_stats() {
        let store = MemoryStore::new();
        store.put("alice", 1_u32, TimeDelta::milliseconds(1)).unwrap();
        store.forever("bob", 2).unwrap();
        std::thread::sleep(Duration::from_millis(10));

        let held = store.lock("bob:refresh", 0, None);
        assert!(held.acquire().unwrap());

        let stats = store.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.held_locks, 1);

        store.forever("alice", 3).unwrap();
        assert_eq!(store.stats().expired_entries, 0);
    }

    #[test]
    fn test_lock_provider_follows_config() {
        assert!(MemoryStore::<u32>::new().lock_provider().is_some());
        assert!(MemoryStore::<u32>::without_locks().lock_provider().is_none());
    }

    #[test]
    fn test_call_counts() {
        let store = MemoryStore::new();
        let before = store.calls();
        store.get("a").unwrap();
        store.forever("a", 1_u32).unwrap();
        store.forget("a").unwrap();

        let delta = store.calls().since(&before);
        assert_eq!(delta.gets, 1);
        assert_eq!(delta.mutations(), 2);
    }

    #[test]
    fn test_refresh_increments_under_lock() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store
                .refresh_with("counter", |count, _| Some(count.unwrap_or(0_u32) + 1), None)
                .unwrap();
        }
        assert_eq!(store.get("counter").unwrap(), Some(3));
        assert_eq!(store.calls().locks, 3);
        assert!(!store.is_locked("counter:refresh"));
    }

    #[test]
    fn test_refresh_stores_with_ttl() {
        let store = MemoryStore::new();
        store
            .refresh("session")
            .put(|_, _| Some("token".to_string()), Some(Expiration::seconds(60)))
            .unwrap();
        assert_eq!(store.calls().puts, 1);
        assert_eq!(store.get("session").unwrap().as_deref(), Some("token"));
    }

    #[test]
    fn test_refresh_times_out_on_held_lock() {
        let store = MemoryStore::new();
        store.forever("foo", "bar".to_string()).unwrap();

        let held = store.lock("foo:refresh", 0, Some("someone-else"));
        assert!(held.acquire().unwrap());

        let err = store
            .refresh("foo")
            .wait_for(0)
            .put(|_, _| Some("new".to_string()), None)
            .unwrap_err();

        assert!(matches!(err, CacheError::LockTimeout { .. }));
        assert_eq!(store.get("foo").unwrap().as_deref(), Some("bar"));
        assert!(held.release().unwrap());
    }

    #[test]
    fn test_concurrent_refreshes_are_serialized() {
        let store = MemoryStore::with_config(StoreConfig {
            lock_retry_millis: 1,
            ..StoreConfig::default()
        });

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        store
                            .refresh("counter")
                            .wait_for(10)
                            .put(
                                |count, _| {
                                    let next = count.unwrap_or(0_u64) + 1;
                                    std::thread::yield_now();
                                    Some(next)
                                },
                                None,
                            )
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(store.get("counter").unwrap(), Some(100));
    }
}
