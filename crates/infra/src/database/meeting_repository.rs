//! SQLite-backed implementation of the meeting repository port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use meetsync_core::MeetingRepository;
use meetsync_domain::{
    Meeting, MeetingFields, MeetSyncError, MeetingStatus, NewMeeting, Result, TimeWindow,
};
use rusqlite::{params, OptionalExtension};
use tokio::task;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::manager::DbManager;
use super::rows::{
    load_meeting, map_join_error, map_meeting_row, opt_millis, to_millis, MEETING_COLUMNS,
};
use crate::errors::conversions::to_domain;

/// SQLite-backed meeting repository.
pub struct SqliteMeetingRepository {
    db: Arc<DbManager>,
}

impl SqliteMeetingRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn validate(new: &NewMeeting) -> Result<()> {
    if new.title.trim().is_empty() {
        return Err(MeetSyncError::InvalidInput("title must not be empty".into()));
    }
    if new.duration_minutes <= 0 {
        return Err(MeetSyncError::InvalidInput("duration_minutes must be positive".into()));
    }
    if new.integration_id.is_some() && new.calendar_event_id.is_none() {
        return Err(MeetSyncError::InvalidInput(
            "integration_id requires a calendar_event_id".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl MeetingRepository for SqliteMeetingRepository {
    #[instrument(skip(self, new), fields(linked = new.calendar_event_id.is_some()))]
    async fn create_meeting(&self, new: &NewMeeting) -> Result<Meeting> {
        validate(new)?;

        let now = Utc::now();
        let baseline = new.calendar_event_id.as_ref().map(|_| MeetingFields {
            title: new.title.clone(),
            date: new.date,
            duration_minutes: new.duration_minutes,
        });
        let meeting = Meeting {
            id: Uuid::now_v7().to_string(),
            calendar_event_id: new.calendar_event_id.clone(),
            integration_id: new.integration_id.clone(),
            title: new.title.clone(),
            date: new.date,
            duration_minutes: new.duration_minutes,
            status: MeetingStatus::Scheduled,
            last_synced_at: None,
            remote_updated_at: None,
            remote_revision: None,
            baseline,
            created_at: now,
            updated_at: now,
        };

        let db = Arc::clone(&self.db);
        let row = meeting.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let baseline = row.baseline.as_ref();
            conn.execute(
                "INSERT INTO meetings (id, calendar_event_id, integration_id, title, date,
                     duration_minutes, status, baseline_title, baseline_date, baseline_duration,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    row.id,
                    row.calendar_event_id,
                    row.integration_id,
                    row.title,
                    to_millis(row.date),
                    row.duration_minutes,
                    row.status.as_str(),
                    baseline.map(|b| b.title.clone()),
                    opt_millis(baseline.map(|b| b.date)),
                    baseline.map(|b| b.duration_minutes),
                    to_millis(row.created_at),
                    to_millis(row.updated_at),
                ],
            )
            .map_err(to_domain)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)??;

        debug!(meeting_id = %meeting.id, "Meeting created");
        Ok(meeting)
    }

    async fn get_meeting(&self, id: &str) -> Result<Option<Meeting>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<Option<Meeting>> {
            let conn = db.get_connection()?;
            load_meeting(&conn, &id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<Meeting>> {
        let db = Arc::clone(&self.db);
        let event_id = event_id.to_string();

        task::spawn_blocking(move || -> Result<Option<Meeting>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE calendar_event_id = ?1"),
                [&event_id],
                map_meeting_row,
            )
            .optional()
            .map_err(to_domain)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_linked_in_window(
        &self,
        integration_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<Meeting>> {
        let db = Arc::clone(&self.db);
        let integration_id = integration_id.to_string();

        task::spawn_blocking(move || -> Result<Vec<Meeting>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {MEETING_COLUMNS} FROM meetings
                     WHERE integration_id = ?1
                       AND calendar_event_id IS NOT NULL
                       AND status != 'cancelled'
                       AND date >= ?2 AND date < ?3
                     ORDER BY date ASC"
                ))
                .map_err(to_domain)?;
            let rows = stmt
                .query_map(
                    params![integration_id, to_millis(window.start), to_millis(window.end)],
                    map_meeting_row,
                )
                .map_err(to_domain)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_domain)
        })
        .await
        .map_err(map_join_error)?
    }
}
