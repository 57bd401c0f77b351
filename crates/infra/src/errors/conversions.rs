//! Mapping of storage, serialization and provider errors onto `MeetSyncError`.
//!
//! The variant chosen decides retry behaviour downstream: the inbox worker
//! and poller retry `Database` and `Network`, and give up on everything else.
//! Lock contention therefore maps to `Database`; a constraint the schema
//! rejects will fail again on retry and maps to `Conflict` or `Internal`.

use meetsync_common::StorageError;
use meetsync_domain::MeetSyncError;
use reqwest::StatusCode;
use rusqlite::ffi;

/// Infrastructure error carried across `?` in repositories and clients.
#[derive(Debug)]
pub struct InfraError(pub MeetSyncError);

impl From<InfraError> for MeetSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MeetSyncError> for InfraError {
    fn from(value: MeetSyncError) -> Self {
        InfraError(value)
    }
}

/// Convert any infrastructure error straight into the domain error.
pub(crate) fn to_domain<E: Into<InfraError>>(err: E) -> MeetSyncError {
    MeetSyncError::from(err.into())
}

// SQLite extended result codes for constraint failures.
const UNIQUE: i32 = 2067;
const PRIMARY_KEY: i32 = 1555;
const TRIGGER: i32 = 1811;

impl From<rusqlite::Error> for InfraError {
    fn from(err: rusqlite::Error) -> Self {
        InfraError(sqlite_error(err))
    }
}

fn sqlite_error(err: rusqlite::Error) -> MeetSyncError {
    use rusqlite::Error as E;

    match err {
        E::SqliteFailure(ffi::Error { code, extended_code }, message) => {
            let detail = message.unwrap_or_else(|| format!("{code:?}"));
            match code {
                ffi::ErrorCode::DatabaseBusy | ffi::ErrorCode::DatabaseLocked => {
                    MeetSyncError::Database(format!("database contention: {detail}"))
                }
                ffi::ErrorCode::ConstraintViolation => match extended_code {
                    UNIQUE | PRIMARY_KEY => MeetSyncError::Conflict(detail),
                    TRIGGER => MeetSyncError::Internal(format!("write rejected: {detail}")),
                    _ => MeetSyncError::Internal(format!("constraint violated: {detail}")),
                },
                ffi::ErrorCode::DiskFull | ffi::ErrorCode::SystemIoFailure => {
                    MeetSyncError::Database(format!("storage unavailable: {detail}"))
                }
                _ => MeetSyncError::Database(format!("sqlite error {extended_code}: {detail}")),
            }
        }
        E::QueryReturnedNoRows => MeetSyncError::NotFound("no matching row".into()),
        E::FromSqlConversionFailure(column, _, cause) => {
            MeetSyncError::Internal(format!("column {column} holds an unreadable value: {cause}"))
        }
        E::InvalidColumnType(column, name, ty) => {
            MeetSyncError::Internal(format!("column {column} ({name}) has unexpected type {ty}"))
        }
        other => MeetSyncError::Database(other.to_string()),
    }
}

impl From<StorageError> for InfraError {
    fn from(err: StorageError) -> Self {
        InfraError(match err {
            StorageError::Rusqlite(err) => sqlite_error(err),
            StorageError::InvalidConfig(message) => MeetSyncError::Config(message),
            StorageError::Pragma(name, err) => {
                MeetSyncError::Config(format!("sqlite rejected pragma {name}: {err}"))
            }
            other => MeetSyncError::Database(other.to_string()),
        })
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(err: r2d2::Error) -> Self {
        InfraError(MeetSyncError::Database(format!("connection pool: {err}")))
    }
}

/// Only stored JSON reaches here; request bodies are decoded at the edge.
impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        InfraError(MeetSyncError::Internal(format!("stored JSON is invalid: {err}")))
    }
}

impl From<reqwest::Error> for InfraError {
    fn from(err: reqwest::Error) -> Self {
        let mapped = if let Some(status) = err.status() {
            status_error(status)
        } else if err.is_decode() {
            MeetSyncError::InvalidInput(format!("provider sent an unreadable body: {err}"))
        } else if err.is_timeout() {
            MeetSyncError::Network("provider request timed out".into())
        } else if err.is_connect() {
            MeetSyncError::Network("cannot reach calendar provider".into())
        } else {
            MeetSyncError::Network(err.to_string())
        };
        InfraError(mapped)
    }
}

/// Provider status to domain error. 401/403 is the signal that an
/// integration needs reconnecting.
pub(crate) fn status_error(status: StatusCode) -> MeetSyncError {
    let message = format!("provider answered {status}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MeetSyncError::Auth(message),
        StatusCode::NOT_FOUND => MeetSyncError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => MeetSyncError::Network(message),
        s if s.is_client_error() => MeetSyncError::InvalidInput(message),
        _ => MeetSyncError::Network(message),
    }
}
