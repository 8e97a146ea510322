//! Error types for the proof ledger.
//!
//! [`LedgerError`] covers every backend failure mode and integrates into
//! [`WalletError`](crate::wallet::WalletError) via `WalletError::Ledger`.

/// Error type for ledger operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// The storage backend encountered an error.
    #[error("[{backend}] {message}")]
    Storage {
        /// Backend identifier (e.g., `"sqlite"`).
        backend: &'static str,
        /// Human-readable error description.
        message: String,
    },

    /// A stored row could not be converted back into a record.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Failed to acquire a lock (e.g., `Mutex` poisoned by a panic).
    #[error("lock error: {0}")]
    Lock(String),

    /// An async task failed to join (`spawn_blocking` panicked or was cancelled).
    #[error("task error: {0}")]
    Task(String),
}

impl LedgerError {
    /// Creates a [`Storage`](Self::Storage) error for the given backend.
    #[must_use]
    pub fn storage(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            backend,
            message: message.into(),
        }
    }
}

/// Enables `?` on [`rusqlite::Error`] inside closures returning [`LedgerError`].
///
/// `#[from]` cannot be used here because the conversion targets the
/// [`Storage`](LedgerError::Storage) variant, which requires a hardcoded
/// `backend` field.
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::storage("sqlite", e.to_string())
    }
}

impl From<tokio::task::JoinError> for LedgerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Convenience alias for ledger-scoped results.
pub type LedgerResult<T> = Result<T, LedgerError>;
