//! Storage primitives for SQLite-backed persistence
//!
//! Provides an r2d2 connection pool with per-connection pragmas, a storage
//! error type, and pool usage counters.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod pragmas;

// Re-export commonly used types
pub use config::SqlitePoolConfig;
pub use error::{StorageError, StorageResult};
pub use metrics::{PoolStats, StorageMetrics};
pub use pool::{SqliteConnection, SqlitePool};
pub use pragmas::apply_connection_pragmas;
