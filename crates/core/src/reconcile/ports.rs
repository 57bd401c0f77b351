//! Port interfaces for meetings, the change ledger and the applier

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_domain::{
    ApplyOutcome, ApplyRequest, ChangeQuery, LocalEdit, Meeting, MeetingChange, NewMeeting,
    Result, TimeWindow,
};

use super::apply::ApplyOptions;

/// Trait for meeting reads and creation
///
/// Meeting fields are only ever modified through [`ReconciliationStore`],
/// which keeps the ledger in step.
#[async_trait]
pub trait MeetingRepository: Send + Sync {
    async fn create_meeting(&self, new: &NewMeeting) -> Result<Meeting>;

    async fn get_meeting(&self, id: &str) -> Result<Option<Meeting>>;

    /// Look up the meeting linked to an external event.
    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<Meeting>>;

    /// Meetings of an integration, linked to an event and dated inside
    /// `window`, that are not cancelled.
    async fn list_linked_in_window(
        &self,
        integration_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<Meeting>>;
}

/// Trait for reading the append-only change ledger
#[async_trait]
pub trait ChangeLedger: Send + Sync {
    /// Rows strictly after `query.after` in `query.order`, at most
    /// `query.limit` of them.
    async fn list_changes(&self, meeting_id: &str, query: &ChangeQuery)
        -> Result<Vec<MeetingChange>>;

    /// Most recent row of a meeting by `(created_at, seq)`.
    async fn latest_change(&self, meeting_id: &str) -> Result<Option<MeetingChange>>;
}

/// Trait for the transactional applier
///
/// Each call loads the meeting, plans with [`super::plan_apply`] and writes
/// the meeting row and ledger row atomically.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Reconcile one meeting against a remote observation.
    ///
    /// Returns `MeetSyncError::NotFound` when the meeting does not exist.
    async fn apply(&self, request: &ApplyRequest, options: &ApplyOptions)
        -> Result<ApplyOutcome>;

    /// Apply a local user edit and append its `updated` row.
    ///
    /// Returns `Ok(None)` when the edit changes nothing.
    async fn record_local_edit(
        &self,
        meeting_id: &str,
        edit: &LocalEdit,
        at: DateTime<Utc>,
    ) -> Result<Option<MeetingChange>>;
}
