//! Provider-side view of calendar events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::meeting::MeetingFields;

/// Decoded state of one external event at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEventSnapshot {
    pub event_id: String,
    pub calendar_id: Option<String>,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Provider modification time, when reported.
    pub updated_at: Option<DateTime<Utc>>,
    /// Provider revision tag (etag), when reported.
    pub revision: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl ExternalEventSnapshot {
    /// Whole minutes between start and end; never negative.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }

    pub fn fields(&self) -> MeetingFields {
        MeetingFields {
            title: self.title.clone(),
            date: self.start,
            duration_minutes: self.duration_minutes(),
        }
    }

    pub fn marker(&self) -> RevisionMarker {
        RevisionMarker { updated_at: self.updated_at, revision: self.revision.clone() }
    }
}

/// What a channel observed for an event: a snapshot, or its absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RemoteObservation {
    Present(ExternalEventSnapshot),
    /// Lookup returned not-found.
    Missing { event_id: String },
}

impl RemoteObservation {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Present(snapshot) => &snapshot.event_id,
            Self::Missing { event_id } => event_id,
        }
    }

    /// Missing, or present with the deleted flag.
    pub fn is_deletion(&self) -> bool {
        match self {
            Self::Present(snapshot) => snapshot.deleted,
            Self::Missing { .. } => true,
        }
    }

    pub fn snapshot(&self) -> Option<&ExternalEventSnapshot> {
        match self {
            Self::Present(snapshot) => Some(snapshot),
            Self::Missing { .. } => None,
        }
    }

    pub fn marker(&self) -> RevisionMarker {
        self.snapshot().map(ExternalEventSnapshot::marker).unwrap_or_default()
    }
}

/// Provider revision marker used for idempotency and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMarker {
    pub updated_at: Option<DateTime<Utc>>,
    pub revision: Option<String>,
}

impl RevisionMarker {
    pub fn is_empty(&self) -> bool {
        self.updated_at.is_none() && self.revision.is_none()
    }
}

/// Closed-open interval `[start, end)` of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn around(now: DateTime<Utc>, lookback: Duration, lookahead: Duration) -> Self {
        Self { start: now - lookback, end: now + lookahead }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}
