//! Recording store for refresh tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use parking_lot::Mutex;

use cache_refresh_core::error::{CacheError, Result};
use cache_refresh_core::{CacheStore, Lock, LockProvider};

/// A store or lock call, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Get(String),
    Put(String, String, TimeDelta),
    Forget(String),
    Forever(String, String),
    Lock(String, u64, Option<String>),
    Block(u64),
    Release(String),
}

/// String store that logs every call it receives.
pub struct RecordingStore {
    values: Mutex<HashMap<String, String>>,
    calls: Arc<Mutex<Vec<Call>>>,
    locking: bool,
    lock_busy: bool,
    failing_on: Option<&'static str>,
}

impl RecordingStore {
    pub fn with_locks() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            locking: true,
            lock_busy: false,
            failing_on: None,
        }
    }

    pub fn without_locks() -> Self {
        Self {
            locking: false,
            ..Self::with_locks()
        }
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        self.values.lock().insert(key.into(), value.into());
        self
    }

    /// Every lock handed out is already held by someone else.
    pub fn lock_busy(mut self) -> Self {
        self.lock_busy = true;
        self
    }

    /// Makes the named store operation fail.
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.failing_on = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of put/forget/forever calls.
    pub fn mutations(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Put(..) | Call::Forget(_) | Call::Forever(..)))
            .count()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn record(&self, call: Call, operation: &str) -> Result<()> {
        self.calls.lock().push(call);
        if self.failing_on == Some(operation) {
            return Err(CacheError::StoreError(format!("{operation} failed")));
        }
        Ok(())
    }
}

impl CacheStore<String> for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.record(Call::Get(key.into()), "get")?;
        Ok(self.value(key))
    }

    fn put(&self, key: &str, value: String, ttl: TimeDelta) -> Result<()> {
        self.record(Call::Put(key.into(), value.clone(), ttl), "put")?;
        self.values.lock().insert(key.into(), value);
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<bool> {
        self.record(Call::Forget(key.into()), "forget")?;
        Ok(self.values.lock().remove(key).is_some())
    }

    fn forever(&self, key: &str, value: String) -> Result<()> {
        self.record(Call::Forever(key.into(), value.clone()), "forever")?;
        self.values.lock().insert(key.into(), value);
        Ok(())
    }

    fn lock_provider(&self) -> Option<&dyn LockProvider> {
        if self.locking {
            Some(self)
        } else {
            None
        }
    }
}

impl LockProvider for RecordingStore {
    fn lock(&self, name: &str, seconds: u64, owner: Option<&str>) -> Box<dyn Lock + '_> {
        self.calls
            .lock()
            .push(Call::Lock(name.into(), seconds, owner.map(Into::into)));

        Box::new(RecordingLock {
            name: name.into(),
            owner: owner.unwrap_or("generated").into(),
            busy: self.lock_busy,
            calls: Arc::clone(&self.calls),
        })
    }
}

struct RecordingLock {
    name: String,
    owner: String,
    busy: bool,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Lock for RecordingLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn acquire(&self) -> Result<bool> {
        Ok(!self.busy)
    }

    fn release(&self) -> Result<bool> {
        self.calls.lock().push(Call::Release(self.name.clone()));
        Ok(true)
    }

    fn block(&self, wait: Duration, callback: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        self.calls.lock().push(Call::Block(wait.as_secs()));

        if !self.acquire()? {
            return Err(CacheError::LockTimeout {
                name: self.name.clone(),
                seconds: wait.as_secs(),
            });
        }

        let outcome = callback();
        self.release()?;
        outcome
    }
}
