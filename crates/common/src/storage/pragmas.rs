//! Per-connection pragmas
//!
//! Run once for every connection the pool opens. WAL lets the audit reads
//! proceed while a reconciliation transaction holds the write lock; the busy
//! timeout makes concurrent appliers queue on that lock.

use rusqlite::Connection;

use super::config::SqlitePoolConfig;
use crate::storage::error::{StorageError, StorageResult};

pub fn apply_connection_pragmas(conn: &Connection, config: &SqlitePoolConfig) -> StorageResult<()> {
    if config.enable_wal {
        // journal_mode answers with the resulting mode, so it cannot go
        // through a plain update.
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(pragma("journal_mode"))?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(StorageError::Connection(format!("journal_mode stayed {mode}")));
        }
    }
    conn.pragma_update(None, "synchronous", "NORMAL").map_err(pragma("synchronous"))?;
    conn.pragma_update(None, "foreign_keys", config.enable_foreign_keys)
        .map_err(pragma("foreign_keys"))?;
    conn.busy_timeout(config.busy_timeout).map_err(pragma("busy_timeout"))?;
    Ok(())
}

fn pragma(name: &'static str) -> impl Fn(rusqlite::Error) -> StorageError {
    move |err| StorageError::Pragma(name, err)
}
