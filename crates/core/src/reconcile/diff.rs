//! Diff engine
//!
//! Compares a local meeting with a remote observation and proposes the
//! changes that would bring the meeting in line. Pure: no I/O, safe to call
//! repeatedly and concurrently.

use meetsync_domain::{ChangeProposal, FieldChange, MeetingSnapshot, MeetingStatus, RemoteObservation};

/// Propose changes for `local` given what the provider reported.
///
/// - A missing or deleted remote yields a single [`ChangeProposal::Deleted`]
///   (nothing for a meeting that is already cancelled).
/// - Title yields at most one [`ChangeProposal::Title`].
/// - Date and duration yield at most one [`ChangeProposal::Schedule`]
///   carrying whichever of the two changed.
///
/// When `local` carries a sync baseline, a field whose remote value still
/// equals the baseline was not touched remotely since the last sync; a
/// differing local value is then a newer local edit and is kept.
pub fn diff(local: &MeetingSnapshot, remote: &RemoteObservation) -> Vec<ChangeProposal> {
    let snapshot = match remote.snapshot() {
        Some(snapshot) if !snapshot.deleted => snapshot,
        _ => {
            return if local.status == MeetingStatus::Cancelled {
                Vec::new()
            } else {
                vec![ChangeProposal::Deleted]
            };
        }
    };

    let remote_fields = snapshot.fields();
    let baseline = local.baseline.as_ref();
    let mut proposals = Vec::with_capacity(2);

    if moved_remotely(baseline.map(|b| &b.title), &remote_fields.title) {
        if let Some(change) = FieldChange::between(local.fields.title.clone(), remote_fields.title)
        {
            proposals.push(ChangeProposal::Title(change));
        }
    }

    let date = moved_remotely(baseline.map(|b| &b.date), &remote_fields.date)
        .then(|| FieldChange::between(local.fields.date, remote_fields.date))
        .flatten();
    let duration = moved_remotely(
        baseline.map(|b| &b.duration_minutes),
        &remote_fields.duration_minutes,
    )
    .then(|| FieldChange::between(local.fields.duration_minutes, remote_fields.duration_minutes))
    .flatten();
    if date.is_some() || duration.is_some() {
        proposals.push(ChangeProposal::Schedule { date, duration });
    }

    proposals
}

/// Without a baseline every remote value counts as a change.
fn moved_remotely<T: PartialEq>(baseline: Option<&T>, remote: &T) -> bool {
    match baseline {
        Some(previous) => previous != remote,
        None => true,
    }
}
