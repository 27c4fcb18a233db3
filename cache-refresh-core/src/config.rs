//! Refresh configuration: lock naming, hold time, and wait time.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOCK_SECONDS, DEFAULT_LOCK_SUFFIX, DEFAULT_WAIT_SECONDS, ENV_LOCK_SECONDS,
    ENV_LOCK_SUFFIX, ENV_WAIT_SECONDS,
};

/// Defaults applied to new refresh operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Appended to the key to name its refresh lock
    pub lock_suffix: String,
    /// Seconds the lock is held once acquired (0 = backend default)
    pub lock_seconds: u64,
    /// Seconds to wait for the lock before failing
    pub wait_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            lock_suffix: DEFAULT_LOCK_SUFFIX.into(),
            lock_seconds: DEFAULT_LOCK_SECONDS,
            wait_seconds: DEFAULT_WAIT_SECONDS,
        }
    }
}

impl RefreshConfig {
    /// Reads overrides from the environment, falling back to defaults for
    /// unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            lock_suffix: std::env::var(ENV_LOCK_SUFFIX).unwrap_or(defaults.lock_suffix),
            lock_seconds: std::env::var(ENV_LOCK_SECONDS)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.lock_seconds),
            wait_seconds: std::env::var(ENV_WAIT_SECONDS)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.wait_seconds),
        }
    }

    /// Sets the lock wait.
    pub fn with_wait(mut self, seconds: u64) -> Self {
        self.wait_seconds = seconds;
        self
    }

    /// Sets the lock hold time.
    pub fn with_lock_seconds(mut self, seconds: u64) -> Self {
        self.lock_seconds = seconds;
        self
    }

    /// Name of the refresh lock for `key`.
    pub fn lock_name(&self, key: &str) -> String {
        format!("{key}{}", self.lock_suffix)
    }
}
