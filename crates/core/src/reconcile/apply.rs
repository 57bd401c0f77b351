//! Apply planning
//!
//! Decides what one reconciliation attempt writes. The storage adapter
//! loads [`ApplyState`] under its write lock, calls [`plan_apply`], and
//! persists the returned meeting row and ledger row in the same
//! transaction.

use chrono::{DateTime, Utc};
use meetsync_domain::{
    ApplyOutcome, ApplyRequest, ChangeData, ChangeProposal, ChangeType, FieldChange, LocalEdit,
    Meeting, MeetingChange, MeetSyncError, MeetingStatus, RemoteObservation, Result,
    RevisionMarker,
};
use uuid::Uuid;

use super::diff::diff;

/// Knobs for one apply call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Append a sync row even when nothing changed.
    pub record_heartbeat: bool,
}

/// Everything read under the write lock.
#[derive(Debug, Clone)]
pub struct ApplyState {
    pub meeting: Meeting,
    pub latest_change: Option<MeetingChange>,
    /// Whether the request's integration guard is still active. `true` when
    /// the request carries no guard.
    pub integration_active: bool,
}

/// Decision taken by [`plan_apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Applied,
    Heartbeat,
    Unchanged,
    Stale,
    Duplicate,
    AlreadyCancelled,
    Abandoned,
}

/// Writes to perform for one apply.
#[derive(Debug, Clone)]
pub struct ApplyPlan {
    pub verdict: Verdict,
    /// Meeting row to write back; `None` writes nothing.
    pub meeting: Option<Meeting>,
    /// Ledger row to append.
    pub change: Option<MeetingChange>,
}

impl ApplyPlan {
    fn skip(verdict: Verdict, meeting: Option<Meeting>) -> Self {
        Self { verdict, meeting, change: None }
    }

    /// Convert into the caller-facing outcome once the ledger row has its
    /// storage sequence.
    pub fn into_outcome(self, seq: Option<i64>) -> ApplyOutcome {
        let change = self.change.map(|mut change| {
            if let Some(seq) = seq {
                change.seq = seq;
            }
            change
        });
        match (self.verdict, change) {
            (Verdict::Applied, Some(change)) => ApplyOutcome::Applied(change),
            (Verdict::Heartbeat, Some(change)) => ApplyOutcome::Heartbeat(change),
            (Verdict::Applied | Verdict::Heartbeat | Verdict::Unchanged, _) => {
                ApplyOutcome::Unchanged
            }
            (Verdict::Stale, _) => ApplyOutcome::Stale,
            (Verdict::Duplicate, _) => ApplyOutcome::Duplicate,
            (Verdict::AlreadyCancelled, _) => ApplyOutcome::AlreadyCancelled,
            (Verdict::Abandoned, _) => ApplyOutcome::Abandoned,
        }
    }
}

/// How an incoming revision relates to the one already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevisionOrder {
    Older,
    Same,
    Newer,
    Unknown,
}

fn compare_revision(incoming: &RevisionMarker, meeting: &Meeting) -> RevisionOrder {
    let revisions = (incoming.revision.as_deref(), meeting.remote_revision.as_deref());
    match (incoming.updated_at, meeting.remote_updated_at) {
        (Some(new), Some(applied)) if new < applied => RevisionOrder::Older,
        (Some(new), Some(applied)) if new > applied => RevisionOrder::Newer,
        (Some(_), Some(_)) => match revisions {
            (Some(new), Some(applied)) if new != applied => RevisionOrder::Newer,
            _ => RevisionOrder::Same,
        },
        _ => match revisions {
            (Some(new), Some(applied)) if new == applied => RevisionOrder::Same,
            _ => RevisionOrder::Unknown,
        },
    }
}

/// Plan the reconciliation of `state.meeting` against `request`.
///
/// Every outcome except [`Verdict::Abandoned`] stamps `last_synced_at`.
pub fn plan_apply(state: &ApplyState, request: &ApplyRequest, options: &ApplyOptions) -> ApplyPlan {
    if !state.integration_active {
        return ApplyPlan::skip(Verdict::Abandoned, None);
    }

    let mut meeting = state.meeting.clone();
    meeting.last_synced_at =
        Some(meeting.last_synced_at.map_or(request.observed_at, |t| t.max(request.observed_at)));

    if state.meeting.status == MeetingStatus::Cancelled {
        return ApplyPlan::skip(Verdict::AlreadyCancelled, Some(meeting));
    }

    let marker = request.observation.marker();
    match compare_revision(&marker, &state.meeting) {
        RevisionOrder::Older => return ApplyPlan::skip(Verdict::Stale, Some(meeting)),
        RevisionOrder::Same => return ApplyPlan::skip(Verdict::Duplicate, Some(meeting)),
        RevisionOrder::Newer | RevisionOrder::Unknown => {}
    }

    let proposals = diff(&state.meeting.snapshot(), &request.observation);

    if !proposals.is_empty() && repeats_latest_payload(state.latest_change.as_ref(), request) {
        return ApplyPlan::skip(Verdict::Duplicate, Some(meeting));
    }

    if let Some(updated_at) = marker.updated_at {
        meeting.remote_updated_at = Some(updated_at);
    }
    if let Some(revision) = marker.revision {
        meeting.remote_revision = Some(revision);
    }
    if let RemoteObservation::Present(snapshot) = &request.observation {
        if !snapshot.deleted {
            meeting.baseline = Some(snapshot.fields());
        }
    }

    let created_at = append_time(state.latest_change.as_ref(), request.observed_at);
    let mut change = MeetingChange {
        id: Uuid::now_v7().to_string(),
        seq: 0,
        meeting_id: meeting.id.clone(),
        change_type: request.provenance.change_type(),
        event_id: meeting
            .calendar_event_id
            .clone()
            .or_else(|| Some(request.observation.event_id().to_string())),
        previous_title: None,
        new_title: None,
        previous_date: None,
        new_date: None,
        previous_duration: None,
        new_duration: None,
        revision: request.observation.marker().revision,
        change_data: request.provenance.change_data(request.raw_payload.clone()),
        created_at,
    };

    if proposals.is_empty() {
        if !options.record_heartbeat {
            return ApplyPlan::skip(Verdict::Unchanged, Some(meeting));
        }
        change.change_data = ChangeData::Heartbeat { payload: request.raw_payload.clone() };
        return ApplyPlan { verdict: Verdict::Heartbeat, meeting: Some(meeting), change: Some(change) };
    }

    for proposal in proposals {
        match proposal {
            ChangeProposal::Deleted => {
                meeting.status = MeetingStatus::Cancelled;
                change.change_type = ChangeType::Deleted;
            }
            ChangeProposal::Title(FieldChange { previous, new }) => {
                meeting.title.clone_from(&new);
                change.previous_title = Some(previous);
                change.new_title = Some(new);
            }
            ChangeProposal::Schedule { date, duration } => {
                if let Some(FieldChange { previous, new }) = date {
                    meeting.date = new;
                    change.previous_date = Some(previous);
                    change.new_date = Some(new);
                }
                if let Some(FieldChange { previous, new }) = duration {
                    meeting.duration_minutes = new;
                    change.previous_duration = Some(previous);
                    change.new_duration = Some(new);
                }
            }
        }
    }
    meeting.updated_at = created_at;

    ApplyPlan { verdict: Verdict::Applied, meeting: Some(meeting), change: Some(change) }
}

/// Plan a local user edit. `Ok(None)` when no field actually changes.
pub fn plan_local_edit(
    meeting: &Meeting,
    latest_change: Option<&MeetingChange>,
    edit: &LocalEdit,
    at: DateTime<Utc>,
) -> Result<Option<(Meeting, MeetingChange)>> {
    if edit.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
        return Err(MeetSyncError::InvalidInput("title must not be empty".into()));
    }
    if edit.duration_minutes.is_some_and(|minutes| minutes <= 0) {
        return Err(MeetSyncError::InvalidInput("duration_minutes must be positive".into()));
    }

    let title = edit.title.clone().and_then(|new| FieldChange::between(meeting.title.clone(), new));
    let date = edit.date.and_then(|new| FieldChange::between(meeting.date, new));
    let duration =
        edit.duration_minutes.and_then(|new| FieldChange::between(meeting.duration_minutes, new));
    if title.is_none() && date.is_none() && duration.is_none() {
        return Ok(None);
    }

    let created_at = append_time(latest_change, at);
    let mut updated = meeting.clone();
    updated.updated_at = created_at;
    if let Some(change) = &title {
        updated.title.clone_from(&change.new);
    }
    if let Some(change) = &date {
        updated.date = change.new;
    }
    if let Some(change) = &duration {
        updated.duration_minutes = change.new;
    }

    let (previous_title, new_title) = split(title);
    let (previous_date, new_date) = split(date);
    let (previous_duration, new_duration) = split(duration);
    let change = MeetingChange {
        id: Uuid::now_v7().to_string(),
        seq: 0,
        meeting_id: meeting.id.clone(),
        change_type: ChangeType::Updated,
        event_id: meeting.calendar_event_id.clone(),
        previous_title,
        new_title,
        previous_date,
        new_date,
        previous_duration,
        new_duration,
        revision: None,
        change_data: ChangeData::LocalEdit { actor: edit.actor.clone() },
        created_at,
    };
    Ok(Some((updated, change)))
}

fn split<T>(change: Option<FieldChange<T>>) -> (Option<T>, Option<T>) {
    match change {
        Some(FieldChange { previous, new }) => (Some(previous), Some(new)),
        None => (None, None),
    }
}

/// Ledger timestamps never go backwards within a meeting.
fn append_time(latest: Option<&MeetingChange>, at: DateTime<Utc>) -> DateTime<Utc> {
    latest.map_or(at, |change| change.created_at.max(at))
}

/// Without a revision marker, a payload identical to the one behind the
/// latest sync row is a redelivery.
fn repeats_latest_payload(latest: Option<&MeetingChange>, request: &ApplyRequest) -> bool {
    latest.is_some_and(|change| {
        change.change_type.is_sync() && change.change_data.payload() == Some(&request.raw_payload)
    })
}
