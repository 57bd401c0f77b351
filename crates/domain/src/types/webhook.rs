//! Webhook deliveries and the durable inbox that queues them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;
use crate::types::external::RemoteObservation;

/// Event kind reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventKind {
    #[serde(rename = "event.created")]
    Created,
    #[serde(rename = "event.updated")]
    Updated,
    #[serde(rename = "event.deleted")]
    Deleted,
}

impl_domain_status_conversions!(WebhookEventKind {
    Created => "event.created",
    Updated => "event.updated",
    Deleted => "event.deleted",
});

/// A verified, decoded webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub kind: WebhookEventKind,
    pub observation: RemoteObservation,
}

impl WebhookDelivery {
    pub fn event_id(&self) -> &str {
        self.observation.event_id()
    }
}

/// Processing state of an inbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Pending,
    Processing,
    Done,
    DeadLetter,
}

impl_domain_status_conversions!(InboxStatus {
    Pending => "pending",
    Processing => "processing",
    Done => "done",
    DeadLetter => "dead_letter",
});

/// Durable record of an acknowledged delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub id: String,
    pub received_at: DateTime<Utc>,
    pub event_id: String,
    pub delivery: WebhookDelivery,
    pub raw_payload: serde_json::Value,
    pub status: InboxStatus,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
