//! Error types for cache refresh operations.
//!
//! Refresh is a thin orchestrator: nothing here is recovered locally. Store
//! and lock failures are surfaced to the caller as-is.

use thiserror::Error;

/// Result type alias using `CacheError`.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Main error type for refresh operations and the stores they drive.
#[derive(Debug, Error)]
pub enum CacheError {
    // ═══════════════════════════════════════════════════════════════════════════
    // LOCK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The refresh lock was not acquired within the wait window.
    /// No cache mutation was performed.
    #[error("Lock '{name}' not acquired within {seconds}s")]
    LockTimeout {
        /// Lock that could not be acquired
        name: String,
        /// Seconds waited
        seconds: u64,
    },

    /// The lock backend itself failed while acquiring or releasing.
    #[error("Lock error: {0}")]
    LockError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A get/put/forget/forever call on the underlying store failed.
    #[error("Store error: {0}")]
    StoreError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The operation was executed in a state it cannot run from,
    /// such as without a refresh callback or with an empty key.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl CacheError {
    /// Returns true if the caller may retry the whole refresh.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CacheError::LockTimeout { .. })
    }

    /// Returns true if this error came from the store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, CacheError::StoreError(_))
    }

    /// Returns true if this error was raised before touching the store.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, CacheError::InvalidConfiguration(_))
    }
}
