//! Pool settings

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    /// Upper bound on open connections; must be non-zero.
    pub max_size: u32,
    /// How long `get_connection` waits for a free connection.
    pub connection_timeout: Duration,
    /// How long a statement waits on a locked database before `SQLITE_BUSY`.
    /// Concurrent reconciliation writers queue on this.
    pub busy_timeout: Duration,
    pub enable_wal: bool,
    pub enable_foreign_keys: bool,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writers_wait_on_locks_no_longer_than_for_a_connection() {
        let config = SqlitePoolConfig::default();
        assert!(config.max_size > 1);
        assert!(config.busy_timeout <= config.connection_timeout);
        assert!(config.enable_wal && config.enable_foreign_keys);
    }
}
