//! Modular common utilities shared across MeetSync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `runtime`: backoff and retry helpers
//! - `platform`: SQLite connection pooling (implies `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod storage;

#[cfg(feature = "runtime")]
pub use resilience::{Backoff, Jitter};
#[cfg(feature = "platform")]
pub use storage::{PoolStats, SqliteConnection, SqlitePool, SqlitePoolConfig, StorageError, StorageResult};
