//! Database connection manager backed by the shared SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use meetsync_common::storage::{SqliteConnection, SqlitePool, SqlitePoolConfig};
use meetsync_domain::{DatabaseConfig, Result};
use rusqlite::params;
use tracing::info;

use crate::errors::conversions::to_domain;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps an [`SqlitePool`].
pub struct DbManager {
    pool: Arc<SqlitePool>,
    path: PathBuf,
}

impl DbManager {
    /// Create a new manager with the given pool size.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let config = SqlitePoolConfig { max_size: pool_size.max(1), ..SqlitePoolConfig::default() };
        Self::with_pool_config(db_path, config)
    }

    /// Create a manager from the `[database]` configuration section.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let pool_config = SqlitePoolConfig {
            max_size: config.pool_size.max(1),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            ..SqlitePoolConfig::default()
        };
        Self::with_pool_config(&config.path, pool_config)
    }

    fn with_pool_config<P: AsRef<Path>>(db_path: P, config: SqlitePoolConfig) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let pool = SqlitePool::new(&path, config).map_err(to_domain)?;

        info!(
            db_path = %path.display(),
            max_connections = pool.max_size(),
            "sqlite pool initialised"
        );

        Ok(Self { pool: Arc::new(pool), path })
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get_connection().map_err(to_domain)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a connection and run a trivial query.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(to_domain)?;
        Ok(())
    }
}

fn create_schema(conn: &SqliteConnection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(to_domain)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER) * 1000)",
        params![SCHEMA_VERSION],
    )
    .map_err(to_domain)?;
    Ok(())
}
