//! Pool usage counters
//!
//! Counters are cumulative for the life of the pool. [`PoolStats`] is the
//! point-in-time view served by the health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct StorageMetrics {
    acquired: AtomicU64,
    timeouts: AtomicU64,
    errors: AtomicU64,
    wait_ms_total: AtomicU64,
}

impl StorageMetrics {
    pub fn record_acquired(&self, waited: Duration) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        self.wait_ms_total.fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Mean wait for a connection; zero before the first acquisition.
    pub fn mean_wait(&self) -> Duration {
        let total = self.wait_ms_total.load(Ordering::Relaxed);
        match self.acquired() {
            0 => Duration::ZERO,
            count => Duration::from_millis(total / count),
        }
    }
}

/// Snapshot of pool occupancy and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub max_size: u32,
    /// Open connections, idle or checked out.
    pub connections: u32,
    pub idle: u32,
    pub acquired: u64,
    pub timeouts: u64,
    pub errors: u64,
    pub mean_wait: Duration,
}

impl PoolStats {
    pub fn in_use(&self) -> u32 {
        self.connections.saturating_sub(self.idle)
    }
}
