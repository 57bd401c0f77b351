//! Row mapping shared by the SQLite repositories.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use meetsync_domain::{
    CalendarIntegration, ChangeData, InboxEntry, Meeting, MeetingChange, MeetingFields,
    MeetSyncError, WebhookDelivery,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use tokio::task::JoinError;

use crate::errors::conversions::to_domain;

pub(crate) const MEETING_COLUMNS: &str = "id, calendar_event_id, integration_id, title, date, \
     duration_minutes, status, last_synced_at, remote_updated_at, remote_revision, \
     baseline_title, baseline_date, baseline_duration, created_at, updated_at";

pub(crate) const CHANGE_COLUMNS: &str = "seq, id, meeting_id, change_type, event_id, \
     previous_title, new_title, previous_date, new_date, previous_duration, new_duration, \
     revision, change_data, created_at";

pub(crate) const INTEGRATION_COLUMNS: &str = "id, user_id, provider, calendar_id, access_token, \
     is_active, sync_state, last_synced_at, last_error, last_error_at, created_at";

pub(crate) const INBOX_COLUMNS: &str = "id, event_id, delivery, raw_payload, status, attempts, \
     next_attempt_at, lease_expires_at, last_error, received_at";

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn opt_millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(to_millis)
}

fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, message.into())
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| conversion_error(idx, Type::Integer, format!("timestamp out of range: {millis}")))
}

fn opt_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

fn parse_text<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err| conversion_error(idx, Type::Text, err))
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|err| conversion_error(idx, Type::Text, err.to_string()))
}

pub(crate) fn map_meeting_row(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    let baseline = match (row.get::<_, Option<String>>(10)?, opt_timestamp(row, 11)?, row.get(12)?) {
        (Some(title), Some(date), Some(duration_minutes)) => {
            Some(MeetingFields { title, date, duration_minutes })
        }
        _ => None,
    };

    Ok(Meeting {
        id: row.get(0)?,
        calendar_event_id: row.get(1)?,
        integration_id: row.get(2)?,
        title: row.get(3)?,
        date: timestamp(row, 4)?,
        duration_minutes: row.get(5)?,
        status: parse_text(row, 6)?,
        last_synced_at: opt_timestamp(row, 7)?,
        remote_updated_at: opt_timestamp(row, 8)?,
        remote_revision: row.get(9)?,
        baseline,
        created_at: timestamp(row, 13)?,
        updated_at: timestamp(row, 14)?,
    })
}

pub(crate) fn map_change_row(row: &Row<'_>) -> rusqlite::Result<MeetingChange> {
    let change_data: ChangeData = parse_json(row, 12)?;
    Ok(MeetingChange {
        seq: row.get(0)?,
        id: row.get(1)?,
        meeting_id: row.get(2)?,
        change_type: parse_text(row, 3)?,
        event_id: row.get(4)?,
        previous_title: row.get(5)?,
        new_title: row.get(6)?,
        previous_date: opt_timestamp(row, 7)?,
        new_date: opt_timestamp(row, 8)?,
        previous_duration: row.get(9)?,
        new_duration: row.get(10)?,
        revision: row.get(11)?,
        change_data,
        created_at: timestamp(row, 13)?,
    })
}

pub(crate) fn map_integration_row(row: &Row<'_>) -> rusqlite::Result<CalendarIntegration> {
    Ok(CalendarIntegration {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider: row.get(2)?,
        calendar_id: row.get(3)?,
        access_token: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        sync_state: parse_text(row, 6)?,
        last_synced_at: opt_timestamp(row, 7)?,
        last_error: row.get(8)?,
        last_error_at: opt_timestamp(row, 9)?,
        created_at: timestamp(row, 10)?,
    })
}

pub(crate) fn map_inbox_row(row: &Row<'_>) -> rusqlite::Result<InboxEntry> {
    let delivery: WebhookDelivery = parse_json(row, 2)?;
    let attempts: i64 = row.get(5)?;
    Ok(InboxEntry {
        id: row.get(0)?,
        event_id: row.get(1)?,
        delivery,
        raw_payload: parse_json(row, 3)?,
        status: parse_text(row, 4)?,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        next_attempt_at: timestamp(row, 6)?,
        lease_expires_at: opt_timestamp(row, 7)?,
        last_error: row.get(8)?,
        received_at: timestamp(row, 9)?,
    })
}

pub(crate) fn load_meeting(conn: &Connection, meeting_id: &str) -> Result<Option<Meeting>, MeetSyncError> {
    conn.query_row(
        &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?1"),
        [meeting_id],
        map_meeting_row,
    )
    .optional()
    .map_err(to_domain)
}

pub(crate) fn load_latest_change(
    conn: &Connection,
    meeting_id: &str,
) -> Result<Option<MeetingChange>, MeetSyncError> {
    conn.query_row(
        &format!(
            "SELECT {CHANGE_COLUMNS} FROM meeting_changes WHERE meeting_id = ?1
             ORDER BY created_at DESC, seq DESC LIMIT 1"
        ),
        [meeting_id],
        map_change_row,
    )
    .optional()
    .map_err(to_domain)
}

pub(crate) fn map_join_error(err: JoinError) -> MeetSyncError {
    if err.is_cancelled() {
        MeetSyncError::Internal("blocking database task cancelled".into())
    } else {
        MeetSyncError::Internal(format!("blocking database task failed: {err}"))
    }
}
