//! In-memory implementations of the storage ports.
//!
//! A single mutex plays the role of the database write lock, so apply
//! calls are serialised exactly like the SQLite `BEGIN IMMEDIATE` path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_core::reconcile::{plan_apply, plan_local_edit, ApplyOptions, ApplyState};
use meetsync_core::{ChangeLedger, IntegrationRepository, MeetingRepository, ReconciliationStore};
use meetsync_domain::{
    ApplyOutcome, ApplyRequest, CalendarIntegration, ChangeOrder, ChangeQuery,
    IntegrationSyncState, LocalEdit, Meeting, MeetSyncError, MeetingChange, MeetingFields,
    MeetingStatus, NewIntegration, NewMeeting, Result, TimeWindow,
};
use parking_lot::Mutex;

use super::base_time;

#[derive(Default)]
struct State {
    meetings: HashMap<String, Meeting>,
    changes: Vec<MeetingChange>,
    integrations: HashMap<String, CalendarIntegration>,
    next_seq: i64,
    next_id: u64,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn append(&mut self, mut change: MeetingChange) -> i64 {
        self.next_seq += 1;
        change.seq = self.next_seq;
        self.changes.push(change);
        self.next_seq
    }

    fn latest(&self, meeting_id: &str) -> Option<MeetingChange> {
        self.changes
            .iter()
            .filter(|c| c.meeting_id == meeting_id)
            .max_by_key(|c| (c.created_at, c.seq))
            .cloned()
    }
}

/// In-memory database implementing every storage port.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    /// Fail every apply for these meeting ids.
    failing_meetings: Arc<Mutex<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_applies_for(&self, meeting_id: &str) {
        self.failing_meetings.lock().push(meeting_id.to_string());
    }

    pub fn seed_meeting(&self, new: NewMeeting) -> Meeting {
        let mut state = self.state.lock();
        let id = state.id("m");
        let baseline = new.calendar_event_id.as_ref().map(|_| MeetingFields {
            title: new.title.clone(),
            date: new.date,
            duration_minutes: new.duration_minutes,
        });
        let meeting = Meeting {
            id: id.clone(),
            calendar_event_id: new.calendar_event_id,
            integration_id: new.integration_id,
            title: new.title,
            date: new.date,
            duration_minutes: new.duration_minutes,
            status: MeetingStatus::Scheduled,
            last_synced_at: None,
            remote_updated_at: None,
            remote_revision: None,
            baseline,
            created_at: base_time(),
            updated_at: base_time(),
        };
        state.meetings.insert(id, meeting.clone());
        meeting
    }

    pub fn seed_integration(&self, calendar_id: &str, token: &str) -> CalendarIntegration {
        let mut state = self.state.lock();
        let id = state.id("int");
        let integration = CalendarIntegration {
            id: id.clone(),
            user_id: "user-1".into(),
            provider: "calendar".into(),
            calendar_id: calendar_id.into(),
            is_active: true,
            access_token: token.into(),
            last_synced_at: None,
            sync_state: IntegrationSyncState::Healthy,
            last_error: None,
            last_error_at: None,
            created_at: base_time(),
        };
        state.integrations.insert(id, integration.clone());
        integration
    }

    pub fn meeting(&self, id: &str) -> Meeting {
        self.state.lock().meetings[id].clone()
    }

    pub fn integration(&self, id: &str) -> CalendarIntegration {
        self.state.lock().integrations[id].clone()
    }

    /// Ledger rows of a meeting in `(created_at, seq)` order.
    pub fn changes(&self, meeting_id: &str) -> Vec<MeetingChange> {
        let mut rows: Vec<_> = self
            .state
            .lock()
            .changes
            .iter()
            .filter(|c| c.meeting_id == meeting_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.created_at, c.seq));
        rows
    }
}

#[async_trait]
impl MeetingRepository for MemoryStore {
    async fn create_meeting(&self, new: &NewMeeting) -> Result<Meeting> {
        Ok(self.seed_meeting(new.clone()))
    }

    async fn get_meeting(&self, id: &str) -> Result<Option<Meeting>> {
        Ok(self.state.lock().meetings.get(id).cloned())
    }

    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<Meeting>> {
        Ok(self
            .state
            .lock()
            .meetings
            .values()
            .find(|m| m.calendar_event_id.as_deref() == Some(event_id))
            .cloned())
    }

    async fn list_linked_in_window(
        &self,
        integration_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<Meeting>> {
        Ok(self
            .state
            .lock()
            .meetings
            .values()
            .filter(|m| {
                m.integration_id.as_deref() == Some(integration_id)
                    && m.calendar_event_id.is_some()
                    && m.status != MeetingStatus::Cancelled
                    && window.contains(m.date)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChangeLedger for MemoryStore {
    async fn list_changes(
        &self,
        meeting_id: &str,
        query: &ChangeQuery,
    ) -> Result<Vec<MeetingChange>> {
        let mut rows = self.changes(meeting_id);
        if query.order == ChangeOrder::Desc {
            rows.reverse();
        }
        Ok(rows
            .into_iter()
            .filter(|c| match (query.after, query.order) {
                (None, _) => true,
                (Some(after), ChangeOrder::Asc) => (c.created_at, c.seq) > (after.created_at, after.seq),
                (Some(after), ChangeOrder::Desc) => (c.created_at, c.seq) < (after.created_at, after.seq),
            })
            .take(query.limit as usize)
            .collect())
    }

    async fn latest_change(&self, meeting_id: &str) -> Result<Option<MeetingChange>> {
        Ok(self.state.lock().latest(meeting_id))
    }
}

#[async_trait]
impl ReconciliationStore for MemoryStore {
    async fn apply(&self, request: &ApplyRequest, options: &ApplyOptions) -> Result<ApplyOutcome> {
        if self.failing_meetings.lock().contains(&request.meeting_id) {
            return Err(MeetSyncError::Database("database is locked".into()));
        }
        let mut state = self.state.lock();
        let meeting = state
            .meetings
            .get(&request.meeting_id)
            .cloned()
            .ok_or_else(|| MeetSyncError::NotFound(request.meeting_id.clone()))?;
        let integration_active = match &request.integration_guard {
            Some(id) => state.integrations.get(id).is_some_and(|i| i.is_active),
            None => true,
        };
        let apply_state =
            ApplyState { latest_change: state.latest(&meeting.id), meeting, integration_active };
        let plan = plan_apply(&apply_state, request, options);

        if let Some(updated) = plan.meeting.clone() {
            state.meetings.insert(updated.id.clone(), updated);
        }
        let seq = plan.change.clone().map(|change| state.append(change));
        Ok(plan.into_outcome(seq))
    }

    async fn record_local_edit(
        &self,
        meeting_id: &str,
        edit: &LocalEdit,
        at: DateTime<Utc>,
    ) -> Result<Option<MeetingChange>> {
        let mut state = self.state.lock();
        let meeting = state
            .meetings
            .get(meeting_id)
            .cloned()
            .ok_or_else(|| MeetSyncError::NotFound(meeting_id.to_string()))?;
        let latest = state.latest(meeting_id);
        let Some((updated, mut change)) = plan_local_edit(&meeting, latest.as_ref(), edit, at)? else {
            return Ok(None);
        };
        state.meetings.insert(updated.id.clone(), updated);
        change.seq = state.append(change.clone());
        Ok(Some(change))
    }
}

#[async_trait]
impl IntegrationRepository for MemoryStore {
    async fn create_integration(&self, new: &NewIntegration) -> Result<CalendarIntegration> {
        Ok(self.seed_integration(&new.calendar_id, &new.access_token))
    }

    async fn get_integration(&self, id: &str) -> Result<Option<CalendarIntegration>> {
        Ok(self.state.lock().integrations.get(id).cloned())
    }

    async fn list_active_integrations(&self) -> Result<Vec<CalendarIntegration>> {
        let mut active: Vec<_> =
            self.state.lock().integrations.values().filter(|i| i.is_active).cloned().collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    async fn is_active(&self, id: &str) -> Result<bool> {
        Ok(self.state.lock().integrations.get(id).is_some_and(|i| i.is_active))
    }

    async fn deactivate(&self, id: &str) -> Result<bool> {
        Ok(match self.state.lock().integrations.get_mut(id) {
            Some(integration) => {
                integration.is_active = false;
                true
            }
            None => false,
        })
    }

    async fn record_sync_success(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        if let Some(integration) =
            self.state.lock().integrations.get_mut(id).filter(|i| i.is_active)
        {
            integration.sync_state = IntegrationSyncState::Healthy;
            integration.last_synced_at = Some(at);
            integration.last_error = None;
        }
        Ok(())
    }

    async fn record_sync_failure(
        &self,
        id: &str,
        state: IntegrationSyncState,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(integration) = self.state.lock().integrations.get_mut(id) {
            integration.sync_state = state;
            integration.last_error = Some(error.to_string());
            integration.last_error_at = Some(at);
        }
        Ok(())
    }
}
