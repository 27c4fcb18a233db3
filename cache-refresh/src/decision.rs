//! What a refresh does to the store once its callback has returned.

use chrono::{DateTime, TimeDelta, Utc};

use cache_refresh_core::Expiration;

/// Store mutation chosen after a refresh callback returns.
///
/// The store is only called when there is something to persist or something
/// existing to remove.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Remove the key.
    Forget,
    /// Store the result for the given TTL.
    Put(TimeDelta),
    /// Store the result without expiration.
    Forever,
    /// Leave the store untouched.
    Skip,
}

impl Decision {
    /// Picks the store mutation for a refresh outcome.
    ///
    /// * `existed` - whether the key held a value before the callback ran
    /// * `has_result` - whether the callback returned a value
    /// * `expiration` - the callback's final expiration
    /// * `now` - reference time for absolute expirations
    pub fn new(existed: bool, has_result: bool, expiration: Expiration, now: DateTime<Utc>) -> Self {
        if existed && expiration.is_now() {
            return Decision::Forget;
        }

        if !has_result {
            return Decision::Skip;
        }

        match expiration.remaining(now) {
            None => Decision::Forever,
            // A zero TTL evicts, so a result with nothing to replace is dropped.
            Some(_) if expiration.is_now() => Decision::Forget,
            Some(ttl) => Decision::Put(ttl),
        }
    }
}
