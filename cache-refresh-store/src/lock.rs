//! In-process named locks backing [`MemoryStore`](crate::MemoryStore).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use cache_refresh_core::error::Result;
use cache_refresh_core::Lock;

/// Holder of a named lock.
#[derive(Clone, Debug)]
pub(crate) struct LockRecord {
    owner: String,
    expires_at: Option<Instant>,
}

impl LockRecord {
    pub(crate) fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Handle to a named lock in a memory store.
///
/// Acquiring succeeds when nobody holds the name or the previous holder's
/// time ran out. Only the owner token that acquired the lock can release it.
#[derive(Debug)]
pub struct MemoryLock {
    locks: Arc<Mutex<HashMap<String, LockRecord>>>,
    name: String,
    owner: String,
    hold: Option<Duration>,
    retry_interval: Duration,
}

impl MemoryLock {
    pub(crate) fn new(
        locks: Arc<Mutex<HashMap<String, LockRecord>>>,
        name: &str,
        seconds: u64,
        owner: Option<&str>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            locks,
            name: name.to_owned(),
            owner: owner.map_or_else(|| Uuid::new_v4().to_string(), str::to_owned),
            hold: (seconds > 0).then(|| Duration::from_secs(seconds)),
            retry_interval,
        }
    }
}

impl Lock for MemoryLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn acquire(&self) -> Result<bool> {
        let mut locks = self.locks.lock();

        if locks.get(&self.name).is_some_and(|held| !held.is_expired()) {
            return Ok(false);
        }

        locks.insert(self.name.clone(), LockRecord {
            owner: self.owner.clone(),
            expires_at: self.hold.and_then(|hold| Instant::now().checked_add(hold)),
        });
        Ok(true)
    }

    fn release(&self) -> Result<bool> {
        let mut locks = self.locks.lock();

        match locks.get(&self.name) {
            Some(held) if held.owner == self.owner => {
                locks.remove(&self.name);
                Ok(true)
            }
            _ => {
                debug!(lock = %self.name, owner = %self.owner, "Release by non-owner ignored");
                Ok(false)
            }
        }
    }

    fn retry_interval(&self) -> Duration {
        self.retry_interval
    }
}
