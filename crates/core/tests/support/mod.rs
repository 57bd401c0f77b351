//! Shared test helpers for `meetsync-core` integration tests.
//!
//! In-memory adapters for every core port plus fixture builders, so tests
//! can focus on reconciliation behaviour instead of storage.

#![allow(dead_code)]

pub mod memory;
pub mod provider;

use chrono::{DateTime, Duration, TimeZone, Utc};
use meetsync_domain::ExternalEventSnapshot;

/// Fixed reference instant for deterministic tests.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(n)
}

/// Event starting `start_offset` minutes after [`base_time`].
pub fn event(
    event_id: &str,
    title: &str,
    start_offset: i64,
    duration: i64,
    updated_offset: i64,
) -> ExternalEventSnapshot {
    ExternalEventSnapshot {
        event_id: event_id.to_string(),
        calendar_id: Some("cal-1".to_string()),
        title: title.to_string(),
        start: minutes(start_offset),
        end: minutes(start_offset + duration),
        updated_at: Some(minutes(updated_offset)),
        revision: Some(format!("{event_id}-r{updated_offset}")),
        deleted: false,
    }
}
