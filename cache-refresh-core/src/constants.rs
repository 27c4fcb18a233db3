//! Defaults shared by refresh operations and lock implementations.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// LOCK DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Suffix appended to a cache key to derive its refresh lock name.
/// Refreshing `"foo"` locks `"foo:refresh"` unless overridden.
pub const DEFAULT_LOCK_SUFFIX: &str = ":refresh";

/// Seconds a refresh lock is held before it expires on its own.
/// Zero defers to the backend, which for the memory store means "until released".
pub const DEFAULT_LOCK_SECONDS: u64 = 0;

/// Seconds a refresh blocks waiting to acquire its lock before failing.
pub const DEFAULT_WAIT_SECONDS: u64 = 10;

/// Milliseconds between acquisition attempts while blocking on a lock.
pub const DEFAULT_LOCK_RETRY_MILLIS: u64 = 250;

/// [`DEFAULT_LOCK_RETRY_MILLIS`] as a [`Duration`].
pub const DEFAULT_LOCK_RETRY: Duration = Duration::from_millis(DEFAULT_LOCK_RETRY_MILLIS);

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Overrides [`DEFAULT_LOCK_SECONDS`].
pub const ENV_LOCK_SECONDS: &str = "CACHE_REFRESH_LOCK_SECONDS";

/// Overrides [`DEFAULT_WAIT_SECONDS`].
pub const ENV_WAIT_SECONDS: &str = "CACHE_REFRESH_WAIT_SECONDS";

/// Overrides [`DEFAULT_LOCK_SUFFIX`].
pub const ENV_LOCK_SUFFIX: &str = "CACHE_REFRESH_LOCK_SUFFIX";
