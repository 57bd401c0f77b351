//! Change ledger rows and the proposals that produce them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;
use crate::types::meeting::MeetingFields;

/// Kind of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Audited local user edit.
    Updated,
    /// Provider reported the event deleted.
    Deleted,
    /// Applied by the reconciliation poller.
    Synced,
    /// Applied from a webhook delivery.
    WebhookSync,
}

impl_domain_status_conversions!(ChangeType {
    Updated => "updated",
    Deleted => "deleted",
    Synced => "synced",
    WebhookSync => "webhook_sync",
});

impl ChangeType {
    /// True for rows written by either sync channel.
    pub fn is_sync(&self) -> bool {
        match self {
            Self::Synced | Self::WebhookSync => true,
            Self::Updated | Self::Deleted => false,
        }
    }
}

/// Channel a remote observation arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    WebhookSync,
    Synced,
}

impl_domain_status_conversions!(Provenance {
    WebhookSync => "webhook_sync",
    Synced => "synced",
});

impl Provenance {
    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::WebhookSync => ChangeType::WebhookSync,
            Self::Synced => ChangeType::Synced,
        }
    }

    /// Wrap a raw provider payload in the matching `ChangeData` variant.
    pub fn change_data(&self, payload: serde_json::Value) -> ChangeData {
        match self {
            Self::WebhookSync => ChangeData::Webhook { payload },
            Self::Synced => ChangeData::Poll { payload },
        }
    }
}

/// Opaque snapshot stored alongside a ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ChangeData {
    Webhook { payload: serde_json::Value },
    Poll { payload: serde_json::Value },
    LocalEdit { actor: Option<String> },
    Heartbeat { payload: serde_json::Value },
}

impl ChangeData {
    /// Raw provider payload, if this row came from the provider.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Webhook { payload } | Self::Poll { payload } | Self::Heartbeat { payload } => {
                Some(payload)
            }
            Self::LocalEdit { .. } => None,
        }
    }
}

/// Before/after pair of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange<T> {
    pub previous: T,
    pub new: T,
}

impl<T: PartialEq> FieldChange<T> {
    /// `Some` only when the values differ.
    pub fn between(previous: T, new: T) -> Option<Self> {
        (previous != new).then_some(Self { previous, new })
    }
}

/// One proposed change produced by the diff engine.
///
/// Date and duration travel together so a joint reschedule is one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeProposal {
    Title(FieldChange<String>),
    Schedule {
        date: Option<FieldChange<DateTime<Utc>>>,
        duration: Option<FieldChange<i64>>,
    },
    Deleted,
}

/// Immutable ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingChange {
    pub id: String,
    /// Storage sequence; zero until persisted.
    pub seq: i64,
    pub meeting_id: String,
    pub change_type: ChangeType,
    pub event_id: Option<String>,
    pub previous_title: Option<String>,
    pub new_title: Option<String>,
    pub previous_date: Option<DateTime<Utc>>,
    pub new_date: Option<DateTime<Utc>>,
    pub previous_duration: Option<i64>,
    pub new_duration: Option<i64>,
    pub revision: Option<String>,
    pub change_data: ChangeData,
    pub created_at: DateTime<Utc>,
}

impl MeetingChange {
    /// A sync row that records contact with the provider but no delta.
    pub fn is_heartbeat(&self) -> bool {
        self.change_type.is_sync()
            && self.new_title.is_none()
            && self.new_date.is_none()
            && self.new_duration.is_none()
    }

    /// Fold this row's deltas into `fields`.
    pub fn apply_to(&self, fields: &mut MeetingFields) {
        if let Some(title) = &self.new_title {
            fields.title.clone_from(title);
        }
        if let Some(date) = self.new_date {
            fields.date = date;
        }
        if let Some(duration) = self.new_duration {
            fields.duration_minutes = duration;
        }
    }

    /// Fold this row's deltas onto `fields`, in reverse.
    pub fn revert_on(&self, fields: &mut MeetingFields) {
        if let Some(title) = &self.previous_title {
            fields.title.clone_from(title);
        }
        if let Some(date) = self.previous_date {
            fields.date = date;
        }
        if let Some(duration) = self.previous_duration {
            fields.duration_minutes = duration;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn row(change_type: ChangeType) -> MeetingChange {
        MeetingChange {
            id: "c-1".into(),
            seq: 1,
            meeting_id: "m-1".into(),
            change_type,
            event_id: Some("evt-1".into()),
            previous_title: None,
            new_title: None,
            previous_date: None,
            new_date: None,
            previous_duration: None,
            new_duration: None,
            revision: None,
            change_data: ChangeData::Poll { payload: serde_json::json!({}) },
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn heartbeat_only_for_sync_rows_without_deltas() {
        assert!(row(ChangeType::Synced).is_heartbeat());
        assert!(!row(ChangeType::Deleted).is_heartbeat());

        let mut titled = row(ChangeType::WebhookSync);
        titled.previous_title = Some("a".into());
        titled.new_title = Some("b".into());
        assert!(!titled.is_heartbeat());
    }

    #[test]
    fn apply_and_revert_only_touch_changed_fields() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut fields = MeetingFields { title: "Standup".into(), date: start, duration_minutes: 15 };
        let mut change = row(ChangeType::Synced);
        change.previous_duration = Some(15);
        change.new_duration = Some(30);

        change.apply_to(&mut fields);
        assert_eq!(fields.duration_minutes, 30);
        assert_eq!(fields.title, "Standup");

        change.revert_on(&mut fields);
        assert_eq!(fields.duration_minutes, 15);
    }

    #[test]
    fn change_data_is_tagged_by_source() {
        let data = Provenance::WebhookSync.change_data(serde_json::json!({"id": "evt-1"}));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["source"], "webhook");
        assert_eq!(json["payload"]["id"], "evt-1");

        let local = ChangeData::LocalEdit { actor: Some("u-1".into()) };
        assert!(local.payload().is_none());
    }

    #[test]
    fn field_change_between_equal_values_is_none() {
        assert!(FieldChange::between(15, 15).is_none());
        assert_eq!(FieldChange::between(15, 30), Some(FieldChange { previous: 15, new: 30 }));
    }
}
