//! Transactional reconciliation writes.
//!
//! Every apply runs load → plan → write inside one `BEGIN IMMEDIATE`
//! transaction, so the webhook worker and the poller serialise on the
//! database write lock and a failure rolls back the meeting update together
//! with its ledger row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_core::reconcile::{plan_apply, plan_local_edit, ApplyOptions, ApplyState};
use meetsync_core::ReconciliationStore;
use meetsync_domain::{
    ApplyOutcome, ApplyRequest, LocalEdit, Meeting, MeetSyncError, MeetingChange, Result,
};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio::task;
use tracing::{debug, instrument};

use super::manager::DbManager;
use super::rows::{load_latest_change, load_meeting, map_join_error, opt_millis, to_millis};
use crate::errors::conversions::to_domain;

pub struct SqliteReconciliationStore {
    db: Arc<DbManager>,
}

impl SqliteReconciliationStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn apply_blocking(
        db: &DbManager,
        request: &ApplyRequest,
        options: &ApplyOptions,
    ) -> Result<ApplyOutcome> {
        let mut conn = db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(to_domain)?;

        let meeting = require_meeting(&tx, &request.meeting_id)?;
        let integration_active = match &request.integration_guard {
            Some(integration_id) => integration_is_active(&tx, integration_id)?,
            None => true,
        };
        let latest_change = load_latest_change(&tx, &meeting.id)?;

        let state = ApplyState { meeting, latest_change, integration_active };
        let plan = plan_apply(&state, request, options);

        if let Some(meeting) = &plan.meeting {
            write_meeting(&tx, meeting)?;
        }
        let seq = plan.change.as_ref().map(|change| insert_change(&tx, change)).transpose()?;

        tx.commit().map_err(to_domain)?;
        Ok(plan.into_outcome(seq))
    }

    fn local_edit_blocking(
        db: &DbManager,
        meeting_id: &str,
        edit: &LocalEdit,
        at: DateTime<Utc>,
    ) -> Result<Option<MeetingChange>> {
        let mut conn = db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(to_domain)?;

        let meeting = require_meeting(&tx, meeting_id)?;
        let latest = load_latest_change(&tx, meeting_id)?;
        let Some((updated, mut change)) = plan_local_edit(&meeting, latest.as_ref(), edit, at)?
        else {
            return Ok(None);
        };

        write_meeting(&tx, &updated)?;
        change.seq = insert_change(&tx, &change)?;
        tx.commit().map_err(to_domain)?;
        Ok(Some(change))
    }
}

#[async_trait]
impl ReconciliationStore for SqliteReconciliationStore {
    #[instrument(
        skip(self, request, options),
        fields(meeting_id = %request.meeting_id, provenance = %request.provenance)
    )]
    async fn apply(&self, request: &ApplyRequest, options: &ApplyOptions) -> Result<ApplyOutcome> {
        let db = Arc::clone(&self.db);
        let request_owned = request.clone();
        let options = *options;

        let outcome = task::spawn_blocking(move || {
            Self::apply_blocking(&db, &request_owned, &options)
        })
        .await
        .map_err(map_join_error)??;

        debug!(outcome = outcome.label(), "Reconciliation applied");
        Ok(outcome)
    }

    #[instrument(skip(self, edit))]
    async fn record_local_edit(
        &self,
        meeting_id: &str,
        edit: &LocalEdit,
        at: DateTime<Utc>,
    ) -> Result<Option<MeetingChange>> {
        let db = Arc::clone(&self.db);
        let meeting_id = meeting_id.to_string();
        let edit = edit.clone();

        task::spawn_blocking(move || Self::local_edit_blocking(&db, &meeting_id, &edit, at))
            .await
            .map_err(map_join_error)?
    }
}

fn require_meeting(conn: &Connection, meeting_id: &str) -> Result<Meeting> {
    load_meeting(conn, meeting_id)?
        .ok_or_else(|| MeetSyncError::NotFound(format!("meeting {meeting_id}")))
}

fn integration_is_active(conn: &Connection, integration_id: &str) -> Result<bool> {
    let active: Option<i64> = conn
        .query_row(
            "SELECT is_active FROM calendar_integrations WHERE id = ?1",
            [integration_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(to_domain)?;
    Ok(active == Some(1))
}

fn write_meeting(conn: &Connection, meeting: &Meeting) -> Result<()> {
    let baseline = meeting.baseline.as_ref();
    conn.execute(
        "UPDATE meetings SET
             title = ?2, date = ?3, duration_minutes = ?4, status = ?5,
             last_synced_at = ?6, remote_updated_at = ?7, remote_revision = ?8,
             baseline_title = ?9, baseline_date = ?10, baseline_duration = ?11,
             updated_at = ?12
         WHERE id = ?1",
        params![
            meeting.id,
            meeting.title,
            to_millis(meeting.date),
            meeting.duration_minutes,
            meeting.status.as_str(),
            opt_millis(meeting.last_synced_at),
            opt_millis(meeting.remote_updated_at),
            meeting.remote_revision,
            baseline.map(|b| b.title.clone()),
            opt_millis(baseline.map(|b| b.date)),
            baseline.map(|b| b.duration_minutes),
            to_millis(meeting.updated_at),
        ],
    )
    .map_err(to_domain)?;
    Ok(())
}

fn insert_change(conn: &Connection, change: &MeetingChange) -> Result<i64> {
    let change_data = serde_json::to_string(&change.change_data).map_err(to_domain)?;
    conn.execute(
        "INSERT INTO meeting_changes (id, meeting_id, change_type, event_id,
             previous_title, new_title, previous_date, new_date,
             previous_duration, new_duration, revision, change_data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            change.id,
            change.meeting_id,
            change.change_type.as_str(),
            change.event_id,
            change.previous_title,
            change.new_title,
            opt_millis(change.previous_date),
            opt_millis(change.new_date),
            change.previous_duration,
            change.new_duration,
            change.revision,
            change_data,
            to_millis(change.created_at),
        ],
    )
    .map_err(to_domain)?;
    Ok(conn.last_insert_rowid())
}
