//! Expiration of refreshed values.
//!
//! [`Expiration`] says how long a value should live once stored. [`Expire`]
//! wraps one and is handed to refresh callbacks so they can change it after
//! seeing the current value.

use chrono::{DateTime, TimeDelta, Utc};

/// How long a value lives in the cache.
///
/// Exactly one interpretation holds at a time. A zero relative duration is the
/// same thing as [`Expiration::Now`] and is normalized to it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Expiration {
    /// Persist without a TTL.
    #[default]
    Never,
    /// Remove the value immediately.
    Now,
    /// Expire at a fixed instant.
    At(DateTime<Utc>),
    /// Expire after a relative duration. Negative durations are passed to the
    /// store as-is.
    After(TimeDelta),
}

impl Expiration {
    /// Expiration after the given number of seconds. Zero means [`Expiration::Now`].
    ///
    /// Values beyond the representable range saturate.
    pub fn seconds(seconds: i64) -> Self {
        let delta = TimeDelta::try_seconds(seconds).unwrap_or(if seconds < 0 {
            TimeDelta::MIN
        } else {
            TimeDelta::MAX
        });
        Self::from(delta)
    }

    /// Returns true for the immediate-delete sentinel.
    pub fn is_now(&self) -> bool {
        matches!(self.normalized(), Expiration::Now)
    }

    /// Returns true if the value should be persisted without a TTL.
    pub fn is_never(&self) -> bool {
        matches!(self, Expiration::Never)
    }

    /// Collapses a zero duration into [`Expiration::Now`].
    pub fn normalized(self) -> Self {
        match self {
            Expiration::After(delta) if delta == TimeDelta::zero() => Expiration::Now,
            other => other,
        }
    }

    /// Time left to live, measured from `now`.
    ///
    /// `None` means no TTL at all. Instants in the past yield a negative delta.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        match self.normalized() {
            Expiration::Never => None,
            Expiration::Now => Some(TimeDelta::zero()),
            Expiration::At(instant) => Some(instant - now),
            Expiration::After(delta) => Some(delta),
        }
    }
}

impl From<TimeDelta> for Expiration {
    fn from(delta: TimeDelta) -> Self {
        Expiration::After(delta).normalized()
    }
}

impl From<std::time::Duration> for Expiration {
    fn from(duration: std::time::Duration) -> Self {
        Self::from(TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX))
    }
}

impl From<DateTime<Utc>> for Expiration {
    fn from(instant: DateTime<Utc>) -> Self {
        Expiration::At(instant)
    }
}

impl From<i64> for Expiration {
    fn from(seconds: i64) -> Self {
        Self::seconds(seconds)
    }
}

impl<T: Into<Expiration>> From<Option<T>> for Expiration {
    fn from(value: Option<T>) -> Self {
        value.map_or(Expiration::Never, Into::into)
    }
}

/// Expiration control passed to a refresh callback.
///
/// Starts out as the operation's default TTL. Whatever it holds when the
/// callback returns decides whether the result is stored, and for how long.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expire {
    at: Expiration,
}

impl Expire {
    /// Creates a control seeded with the given expiration.
    pub fn new(at: impl Into<Expiration>) -> Self {
        Self {
            at: at.into().normalized(),
        }
    }

    /// Expires the key at the given instant, duration, or sentinel.
    pub fn at(&mut self, at: impl Into<Expiration>) {
        self.at = at.into().normalized();
    }

    /// Expires the key immediately, removing it from the cache.
    pub fn now(&mut self) {
        self.at(Expiration::Now);
    }

    /// Persists the new value without expiration.
    pub fn never(&mut self) {
        self.at(Expiration::Never);
    }

    /// The expiration currently in effect.
    pub fn expiration(&self) -> Expiration {
        self.at
    }
}

impl Default for Expire {
    fn default() -> Self {
        Self::new(Expiration::Never)
    }
}
