//! Audit service: paged ledger reads and chain verification.

use std::sync::Arc;

use meetsync_domain::constants::MAX_CHANGE_PAGE_SIZE;
use meetsync_domain::{
    ChangeCursor, ChangeOrder, ChangePage, ChangeQuery, Meeting, MeetSyncError, MeetingChange,
    MeetingFields, Result,
};
use serde::Serialize;
use tracing::instrument;

use super::cursor::{decode_cursor, encode_cursor};
use crate::reconcile::ports::{ChangeLedger, MeetingRepository};

/// Fold ledger deltas over an initial state, in the order given.
pub fn replay(initial: MeetingFields, changes: &[MeetingChange]) -> MeetingFields {
    changes.iter().fold(initial, |mut fields, change| {
        change.apply_to(&mut fields);
        fields
    })
}

/// A ledger row whose `previous_*` value disagrees with the state the rows
/// before it produce, or a final state that disagrees with the meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    /// `None` for the final-state comparison.
    pub change_id: Option<String>,
    pub field: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub meeting_id: String,
    pub changes: usize,
    pub initial: MeetingFields,
    pub breaks: Vec<ChainBreak>,
}

impl ChainReport {
    pub fn is_consistent(&self) -> bool {
        self.breaks.is_empty()
    }
}

pub struct AuditService {
    meetings: Arc<dyn MeetingRepository>,
    ledger: Arc<dyn ChangeLedger>,
}

impl AuditService {
    pub fn new(meetings: Arc<dyn MeetingRepository>, ledger: Arc<dyn ChangeLedger>) -> Self {
        Self { meetings, ledger }
    }

    /// One page of a meeting's change history.
    ///
    /// # Errors
    /// `NotFound` for an unknown meeting, `InvalidInput` for a bad cursor.
    #[instrument(skip(self, cursor))]
    pub async fn list_changes(
        &self,
        meeting_id: &str,
        order: ChangeOrder,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<ChangePage> {
        self.require_meeting(meeting_id).await?;

        let after = cursor.filter(|raw| !raw.is_empty()).map(decode_cursor).transpose()?;
        let query = ChangeQuery::new(order, limit, after);
        let probe = ChangeQuery { limit: query.limit + 1, ..query };
        let mut changes = self.ledger.list_changes(meeting_id, &probe).await?;

        let has_more = changes.len() > query.limit as usize;
        changes.truncate(query.limit as usize);
        let next_cursor = if has_more {
            changes.last().map(|last| encode_cursor(&ChangeCursor::from(last)))
        } else {
            None
        };

        Ok(ChangePage { meeting_id: meeting_id.to_string(), order, changes, next_cursor })
    }

    /// Check that the ledger accounts for the meeting's current values.
    ///
    /// Walks the history backwards from the current row to recover the
    /// initial values, then forwards checking that each row's `previous_*`
    /// matches what the rows before it produced.
    #[instrument(skip(self))]
    pub async fn verify_chain(&self, meeting_id: &str) -> Result<ChainReport> {
        let meeting = self.require_meeting(meeting_id).await?;
        let changes = self.all_changes(meeting_id).await?;

        let current = meeting.fields();
        let initial = changes.iter().rev().fold(current.clone(), |mut fields, change| {
            change.revert_on(&mut fields);
            fields
        });

        let mut breaks = Vec::new();
        let mut running = initial.clone();
        for change in &changes {
            let id = || Some(change.id.clone());
            if change.previous_title.as_ref().is_some_and(|t| *t != running.title) {
                breaks.push(ChainBreak { change_id: id(), field: "title" });
            }
            if change.previous_date.is_some_and(|d| d != running.date) {
                breaks.push(ChainBreak { change_id: id(), field: "date" });
            }
            if change.previous_duration.is_some_and(|d| d != running.duration_minutes) {
                breaks.push(ChainBreak { change_id: id(), field: "duration_minutes" });
            }
            change.apply_to(&mut running);
        }
        for (field, differs) in [
            ("title", running.title != current.title),
            ("date", running.date != current.date),
            ("duration_minutes", running.duration_minutes != current.duration_minutes),
        ] {
            if differs {
                breaks.push(ChainBreak { change_id: None, field });
            }
        }

        Ok(ChainReport { meeting_id: meeting_id.to_string(), changes: changes.len(), initial, breaks })
    }

    /// Full history, oldest first.
    pub async fn all_changes(&self, meeting_id: &str) -> Result<Vec<MeetingChange>> {
        let mut all = Vec::new();
        let mut after = None;
        loop {
            let query = ChangeQuery::new(ChangeOrder::Asc, Some(MAX_CHANGE_PAGE_SIZE), after);
            let page = self.ledger.list_changes(meeting_id, &query).await?;
            let done = page.len() < query.limit as usize;
            after = page.last().map(ChangeCursor::from);
            all.extend(page);
            if done || after.is_none() {
                return Ok(all);
            }
        }
    }

    async fn require_meeting(&self, meeting_id: &str) -> Result<Meeting> {
        self.meetings
            .get_meeting(meeting_id)
            .await?
            .ok_or_else(|| MeetSyncError::NotFound(format!("meeting {meeting_id}")))
    }
}
