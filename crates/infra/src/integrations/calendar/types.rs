//! Provider wire types and their conversion into domain snapshots.

use chrono::{DateTime, Utc};
use meetsync_domain::{
    ExternalEventSnapshot, MeetSyncError, RemoteObservation, Result, WebhookDelivery,
    WebhookEventKind,
};
use serde::{Deserialize, Serialize};

/// Event as returned by the provider API and embedded in webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub id: String,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ProviderEvent {
    /// Decode into a snapshot. Start and end times are required.
    pub fn into_snapshot(self) -> Result<ExternalEventSnapshot> {
        let (Some(start), Some(end)) = (self.start_time, self.end_time) else {
            return Err(MeetSyncError::InvalidInput(format!(
                "event {} is missing start_time or end_time",
                self.id
            )));
        };
        if end < start {
            return Err(MeetSyncError::InvalidInput(format!(
                "event {} ends before it starts",
                self.id
            )));
        }
        Ok(ExternalEventSnapshot {
            event_id: self.id,
            calendar_id: self.calendar_id,
            title: self.title.unwrap_or_default(),
            start,
            end,
            updated_at: self.updated_at,
            revision: self.etag,
            deleted: self.is_deleted,
        })
    }

    /// Decode into an observation. A deletion without full event data
    /// becomes [`RemoteObservation::Missing`].
    pub fn into_observation(self, deleted: bool) -> Result<RemoteObservation> {
        let deleted = deleted || self.is_deleted;
        if deleted && (self.start_time.is_none() || self.end_time.is_none()) {
            return Ok(RemoteObservation::Missing { event_id: self.id });
        }
        let mut snapshot = self.into_snapshot()?;
        snapshot.deleted = deleted;
        Ok(RemoteObservation::Present(snapshot))
    }
}

/// One page of `GET /calendars/{id}/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    #[serde(default)]
    pub results: Vec<ProviderEvent>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Body of a provider webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub kind: WebhookEventKind,
    pub event: ProviderEvent,
}

impl WebhookEnvelope {
    pub fn into_delivery(self) -> Result<WebhookDelivery> {
        let deleted = self.kind == WebhookEventKind::Deleted;
        let observation = self.event.into_observation(deleted)?;
        Ok(WebhookDelivery { kind: self.kind, observation })
    }
}

/// Body of `PUT /webhooks`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RegisterWebhookRequest<'a> {
    pub url: &'a str,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn event_json() -> serde_json::Value {
        json!({
            "id": "evt-1",
            "calendar_id": "cal-1",
            "title": "Planning",
            "start_time": "2024-03-04T10:00:00Z",
            "end_time": "2024-03-04T10:45:00Z",
            "updated_at": "2024-03-01T08:00:00Z",
            "etag": "\"abc\""
        })
    }

    #[test]
    fn snapshot_carries_duration_and_revision() {
        let event: ProviderEvent = serde_json::from_value(event_json()).unwrap();
        let snapshot = event.into_snapshot().unwrap();

        assert_eq!(snapshot.start, Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap());
        assert_eq!(snapshot.duration_minutes(), 45);
        assert_eq!(snapshot.revision.as_deref(), Some("\"abc\""));
        assert!(!snapshot.deleted);
    }

    #[test]
    fn missing_times_are_rejected() {
        let event: ProviderEvent =
            serde_json::from_value(json!({ "id": "evt-2", "title": "x" })).unwrap();
        assert!(matches!(event.into_snapshot(), Err(MeetSyncError::InvalidInput(_))));
    }

    #[test]
    fn bare_deletion_becomes_missing() {
        let envelope: WebhookEnvelope =
            serde_json::from_value(json!({ "type": "event.deleted", "event": { "id": "evt-3" } }))
                .unwrap();
        let delivery = envelope.into_delivery().unwrap();

        assert_eq!(delivery.kind, WebhookEventKind::Deleted);
        assert_eq!(delivery.observation, RemoteObservation::Missing { event_id: "evt-3".into() });
    }

    #[test]
    fn full_deletion_keeps_revision() {
        let envelope: WebhookEnvelope =
            serde_json::from_value(json!({ "type": "event.deleted", "event": event_json() }))
                .unwrap();
        let delivery = envelope.into_delivery().unwrap();

        let snapshot = delivery.observation.snapshot().unwrap();
        assert!(snapshot.deleted);
        assert!(snapshot.updated_at.is_some());
        assert!(delivery.observation.is_deletion());
    }

    #[test]
    fn unknown_event_type_fails_to_decode() {
        let result = serde_json::from_value::<WebhookEnvelope>(
            json!({ "type": "calendar.shared", "event": event_json() }),
        );
        assert!(result.is_err());
    }
}
