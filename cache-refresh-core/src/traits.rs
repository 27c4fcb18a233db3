//! Store and lock traits.
//!
//! A refresh runs against any [`CacheStore`]. Stores that can serialize
//! concurrent writers also hand out a [`LockProvider`]; stores that cannot
//! return `None` and refreshes against them are not atomic.

use std::time::{Duration, Instant};

use chrono::TimeDelta;
use tracing::{debug, warn};

use crate::constants::DEFAULT_LOCK_RETRY;
use crate::error::{CacheError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key-value storage a refresh reads from and writes to.
///
/// Implementations might be:
/// - An in-process map (for testing/development)
/// - Redis, Memcached, or a database table (for production)
///
/// A stored "null" is indistinguishable from a missing key: `get` returns
/// `None` for both.
pub trait CacheStore<V>: Send + Sync {
    /// Retrieves the value under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<V>>;

    /// Stores `value` under `key` for `ttl`.
    ///
    /// A non-positive `ttl` is the store's concern; the usual behaviour is to
    /// drop the key.
    fn put(&self, key: &str, value: V, ttl: TimeDelta) -> Result<()>;

    /// Removes `key`. Returns true if something was removed.
    fn forget(&self, key: &str) -> Result<bool>;

    /// Stores `value` under `key` without expiration.
    fn forever(&self, key: &str, value: V) -> Result<()>;

    /// The lock capability of this store, if it has one.
    fn lock_provider(&self) -> Option<&dyn LockProvider> {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCK TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Hands out named locks.
pub trait LockProvider: Send + Sync {
    /// Creates a lock handle for `name`, held for `seconds` once acquired
    /// (zero defers to the backend). With no `owner`, the backend picks a
    /// unique token.
    ///
    /// Creating the handle does not acquire the lock.
    fn lock(&self, name: &str, seconds: u64, owner: Option<&str>) -> Box<dyn Lock + '_>;
}

/// A named lock owned by a single token.
pub trait Lock {
    /// Name of the lock.
    fn name(&self) -> &str;

    /// Owner token this handle acquires and releases with.
    fn owner(&self) -> &str;

    /// Attempts to acquire the lock once, without waiting.
    fn acquire(&self) -> Result<bool>;

    /// Releases the lock if this handle's owner holds it.
    fn release(&self) -> Result<bool>;

    /// Pause between acquisition attempts in [`Lock::block`].
    fn retry_interval(&self) -> Duration {
        DEFAULT_LOCK_RETRY
    }

    /// Blocks up to `wait` to acquire the lock, runs `callback`, then releases.
    ///
    /// Fails with [`CacheError::LockTimeout`] without running `callback` if the
    /// lock cannot be acquired in time. The lock is released on every exit
    /// path, including a panicking callback. An error from `callback` takes
    /// precedence over an error from releasing.
    fn block(&self, wait: Duration, callback: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let started = Instant::now();

        while !self.acquire()? {
            let elapsed = started.elapsed();
            if elapsed >= wait {
                warn!(lock = self.name(), wait_seconds = wait.as_secs(), "Lock wait timed out");
                return Err(CacheError::LockTimeout {
                    name: self.name().to_owned(),
                    seconds: wait.as_secs(),
                });
            }
            std::thread::sleep(self.retry_interval().min(wait - elapsed));
        }

        debug!(lock = self.name(), owner = self.owner(), "Lock acquired");

        let guard = ReleaseGuard { lock: self, armed: true };
        let outcome = callback();
        let released = guard.release();

        outcome?;
        released.map(|_| ())
    }
}

/// Releases a held lock when dropped, unless released explicitly first.
struct ReleaseGuard<'a, L: Lock + ?Sized> {
    lock: &'a L,
    armed: bool,
}

impl<L: Lock + ?Sized> ReleaseGuard<'_, L> {
    fn release(mut self) -> Result<bool> {
        self.armed = false;
        let released = self.lock.release()?;
        debug!(lock = self.lock.name(), released, "Lock released");
        Ok(released)
    }
}

impl<L: Lock + ?Sized> Drop for ReleaseGuard<'_, L> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(error) = self.lock.release() {
                warn!(lock = self.lock.name(), %error, "Failed to release lock while unwinding");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Lock that becomes free after a fixed number of failed attempts.
    struct CountdownLock {
        busy_for: Cell<u32>,
        attempts: Cell<u32>,
        held: Cell<bool>,
        releases: Cell<u32>,
    }

    impl CountdownLock {
        fn new(busy_for: u32) -> Self {
            Self {
                busy_for: Cell::new(busy_for),
                attempts: Cell::new(0),
                held: Cell::new(false),
                releases: Cell::new(0),
            }
        }
    }

    impl Lock for CountdownLock {
        fn name(&self) -> &str {
            "foo:refresh"
        }

        fn owner(&self) -> &str {
            "owner"
        }

        fn acquire(&self) -> Result<bool> {
            self.attempts.set(self.attempts.get() + 1);
            if self.busy_for.get() > 0 {
                self.busy_for.set(self.busy_for.get() - 1);
                return Ok(false);
            }
            self.held.set(true);
            Ok(true)
        }

        fn release(&self) -> Result<bool> {
            self.releases.set(self.releases.get() + 1);
            Ok(self.held.replace(false))
        }

        fn retry_interval(&self) -> Duration {
            Duration::from_millis(1)
        }
    }

    #[test]
    fn test_block_runs_callback_and_releases() {
        let lock = CountdownLock::new(0);
        let mut ran = false;
        lock.block(Duration::from_secs(1), &mut || {
            ran = true;
            Ok(())
        })
        .unwrap();

        assert!(ran);
        assert!(!lock.held.get());
        assert_eq!(lock.releases.get(), 1);
    }

    #[test]
    fn test_block_retries_until_acquired() {
        let lock = CountdownLock::new(3);
        lock.block(Duration::from_secs(1), &mut || Ok(())).unwrap();
        assert_eq!(lock.attempts.get(), 4);
    }

    #[test]
    fn test_block_times_out_without_running_callback() {
        let lock = CountdownLock::new(u32::MAX);
        let mut ran = false;
        let err = lock
            .block(Duration::ZERO, &mut || {
                ran = true;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, CacheError::LockTimeout { ref name, seconds: 0 } if name == "foo:refresh"));
        assert!(!ran);
        assert_eq!(lock.releases.get(), 0);
    }

    #[test]
    fn test_block_releases_when_callback_fails() {
        let lock = CountdownLock::new(0);
        let err = lock
            .block(Duration::from_secs(1), &mut || {
                Err(CacheError::StoreError("boom".into()))
            })
            .unwrap_err();

        assert!(err.is_store_error());
        assert!(!lock.held.get());
        assert_eq!(lock.releases.get(), 1);
    }

    #[test]
    fn test_block_releases_when_callback_panics() {
        let lock = CountdownLock::new(0);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = lock.block(Duration::from_secs(1), &mut || panic!("callback panicked"));
        }));

        assert!(outcome.is_err());
        assert!(!lock.held.get());
        assert_eq!(lock.releases.get(), 1);
    }
}
