//! SQLite connection pool
//!
//! Thin wrapper over r2d2 that runs the connection pragmas on every new
//! connection and keeps acquisition counters.

use std::path::Path;
use std::time::{Duration, Instant};

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, instrument, warn};

use super::config::SqlitePoolConfig;
use super::pragmas::apply_connection_pragmas;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::metrics::{PoolStats, StorageMetrics};

/// Pooled SQLite connection; returned to the pool on drop.
pub type SqliteConnection = PooledConnection<SqliteConnectionManager>;

#[derive(Debug)]
pub struct SqlitePool {
    inner: Pool<SqliteConnectionManager>,
    connection_timeout: Duration,
    metrics: StorageMetrics,
}

impl SqlitePool {
    /// Open (or create) the database at `path`.
    ///
    /// Fails here, not on first use, when the file cannot be opened or the
    /// pragmas are rejected.
    #[instrument(skip(config), fields(db_path = %path.display(), pool_size = config.max_size))]
    pub fn new(path: &Path, config: SqlitePoolConfig) -> StorageResult<Self> {
        if config.max_size == 0 {
            return Err(StorageError::InvalidConfig("pool size must be at least 1".into()));
        }

        let connection_timeout = config.connection_timeout;
        let max_size = config.max_size;
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            apply_connection_pragmas(conn, &config)
                .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))
        });

        let inner = Pool::builder()
            .max_size(max_size)
            .connection_timeout(connection_timeout)
            .build(manager)
            .map_err(|err| StorageError::Connection(format!("cannot open {}: {err}", path.display())))?;

        let probe: i64 = inner.get()?.query_row("SELECT 1", [], |row| row.get(0))?;
        debug!(probe, "pool ready");

        Ok(Self { inner, connection_timeout, metrics: StorageMetrics::default() })
    }

    /// Borrow a connection, waiting up to the configured timeout.
    pub fn get_connection(&self) -> StorageResult<SqliteConnection> {
        let started = Instant::now();
        self.inner
            .get_timeout(self.connection_timeout)
            .map(|conn| {
                self.metrics.record_acquired(started.elapsed());
                conn
            })
            .map_err(|err| {
                // r2d2 reports exhaustion only through its message.
                if err.to_string().contains("timed out") {
                    self.metrics.record_timeout();
                    warn!(waited = ?started.elapsed(), "sqlite pool exhausted");
                    StorageError::Timeout(self.connection_timeout.as_secs())
                } else {
                    self.metrics.record_error();
                    warn!(error = %err, "sqlite connection failed");
                    StorageError::Connection(err.to_string())
                }
            })
    }

    pub fn max_size(&self) -> u32 {
        self.inner.max_size()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state();
        PoolStats {
            max_size: self.inner.max_size(),
            connections: state.connections,
            idle: state.idle_connections,
            acquired: self.metrics.acquired(),
            timeouts: self.metrics.timeouts(),
            errors: self.metrics.errors(),
            mean_wait: self.metrics.mean_wait(),
        }
    }
}
