//! Reconciliation requests, outcomes and audit paging types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CHANGE_PAGE_SIZE, MAX_CHANGE_PAGE_SIZE};
use crate::impl_domain_status_conversions;
use crate::types::change::{MeetingChange, Provenance};
use crate::types::external::RemoteObservation;

/// Everything the applier needs to reconcile one meeting.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRequest {
    pub meeting_id: String,
    pub observation: RemoteObservation,
    pub provenance: Provenance,
    pub raw_payload: serde_json::Value,
    /// Integration that must still be active when the write happens.
    pub integration_guard: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Result of one apply attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Meeting updated and the ledger row appended.
    Applied(MeetingChange),
    /// Nothing changed; a heartbeat row was appended.
    Heartbeat(MeetingChange),
    /// Nothing changed.
    Unchanged,
    /// Older than the revision already applied.
    Stale,
    /// Same revision already applied.
    Duplicate,
    /// Meeting was already cancelled by a provider deletion.
    AlreadyCancelled,
    /// Guarding integration was deactivated.
    Abandoned,
}

impl ApplyOutcome {
    pub fn change(&self) -> Option<&MeetingChange> {
        match self {
            Self::Applied(change) | Self::Heartbeat(change) => Some(change),
            _ => None,
        }
    }

    /// Label for logs and counters.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Heartbeat(_) => "heartbeat",
            Self::Unchanged => "unchanged",
            Self::Stale => "stale",
            Self::Duplicate => "duplicate",
            Self::AlreadyCancelled => "already_cancelled",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Sort order of an audit query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrder {
    Asc,
    #[default]
    Desc,
}

impl_domain_status_conversions!(ChangeOrder {
    Asc => "asc",
    Desc => "desc",
});

/// Position in a meeting's ledger, exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCursor {
    pub created_at: DateTime<Utc>,
    pub seq: i64,
}

impl From<&MeetingChange> for ChangeCursor {
    fn from(change: &MeetingChange) -> Self {
        Self { created_at: change.created_at, seq: change.seq }
    }
}

/// Audit query parameters after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeQuery {
    pub order: ChangeOrder,
    pub limit: u32,
    pub after: Option<ChangeCursor>,
}

impl ChangeQuery {
    /// Clamp the requested page size into `1..=MAX_CHANGE_PAGE_SIZE`.
    pub fn new(order: ChangeOrder, limit: Option<u32>, after: Option<ChangeCursor>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_CHANGE_PAGE_SIZE).clamp(1, MAX_CHANGE_PAGE_SIZE);
        Self { order, limit, after }
    }
}

impl Default for ChangeQuery {
    fn default() -> Self {
        Self::new(ChangeOrder::default(), None, None)
    }
}

/// One page of a meeting's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePage {
    pub meeting_id: String,
    pub order: ChangeOrder,
    pub changes: Vec<MeetingChange>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_is_newest_first() {
        assert_eq!(ChangeQuery::default().order, ChangeOrder::Desc);
        assert_eq!(ChangeQuery::default().limit, DEFAULT_CHANGE_PAGE_SIZE);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(ChangeQuery::new(ChangeOrder::Asc, Some(0), None).limit, 1);
        assert_eq!(ChangeQuery::new(ChangeOrder::Asc, Some(10_000), None).limit, MAX_CHANGE_PAGE_SIZE);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(ApplyOutcome::Stale.label(), "stale");
        assert!(ApplyOutcome::Duplicate.change().is_none());
    }
}
