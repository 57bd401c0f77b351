//! Meeting records and the values that drift against the provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Lifecycle status of a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl_domain_status_conversions!(MeetingStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// The drift-prone fields shared by a meeting and its external event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingFields {
    pub title: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Locally stored meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub calendar_event_id: Option<String>,
    pub integration_id: Option<String>,
    pub title: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: MeetingStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Provider `updated_at` of the newest revision applied so far.
    pub remote_updated_at: Option<DateTime<Utc>>,
    /// Provider revision tag (etag) of the newest revision applied so far.
    pub remote_revision: Option<String>,
    /// Remote values as of the last applied revision.
    pub baseline: Option<MeetingFields>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn fields(&self) -> MeetingFields {
        MeetingFields {
            title: self.title.clone(),
            date: self.date,
            duration_minutes: self.duration_minutes,
        }
    }

    pub fn set_fields(&mut self, fields: MeetingFields) {
        self.title = fields.title;
        self.date = fields.date;
        self.duration_minutes = fields.duration_minutes;
    }

    pub fn snapshot(&self) -> MeetingSnapshot {
        MeetingSnapshot { fields: self.fields(), status: self.status, baseline: self.baseline.clone() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == MeetingStatus::Cancelled
    }
}

/// Read-only view of a meeting handed to the diff engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingSnapshot {
    pub fields: MeetingFields,
    pub status: MeetingStatus,
    pub baseline: Option<MeetingFields>,
}

/// Input for creating a meeting.
///
/// When `calendar_event_id` is set the meeting is assumed to mirror that
/// event, so the initial values also become the sync baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMeeting {
    pub title: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(default)]
    pub calendar_event_id: Option<String>,
    #[serde(default)]
    pub integration_id: Option<String>,
}

/// A user edit of a meeting. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub actor: Option<String>,
}

impl LocalEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.date.is_none() && self.duration_minutes.is_none()
    }
}
