//! Storage error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("no pooled connection within {0}s")]
    Timeout(u64),

    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to set pragma {0}: {1}")]
    Pragma(&'static str, #[source] rusqlite::Error),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Pool exhaustion, lost connections and SQLite busy/locked are worth
    /// retrying; everything else is a bug or a bad configuration.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) | Self::R2d2(_) => true,
            Self::Rusqlite(err) | Self::Pragma(_, err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::InvalidConfig(_) => false,
        }
    }
}
