//! Error types for the storage layer.

use tessera_license::LicenseError;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure, with what the store was doing at the time.
    #[error("{context}: {source}")]
    Database {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The connection mutex was poisoned by a panicking writer.
    #[error("store connection lock poisoned")]
    LockPoisoned,
}

impl From<StoreError> for LicenseError {
    fn from(err: StoreError) -> Self {
        LicenseError::Storage(err.to_string())
    }
}

/// Attaches a context string to rusqlite results.
pub(crate) trait Context<T> {
    fn context(self, context: &'static str) -> StoreResult<T>;
}

impl<T> Context<T> for Result<T, rusqlite::Error> {
    fn context(self, context: &'static str) -> StoreResult<T> {
        self.map_err(|source| StoreError::Database { context, source })
    }
}
