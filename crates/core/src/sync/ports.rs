//! Port interface for the durable webhook inbox

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use meetsync_domain::{InboxEntry, Result, WebhookDelivery};

/// Durable queue between webhook acknowledgement and processing.
///
/// Delivery is at-least-once: a claimed entry whose lease expires becomes
/// claimable again.
#[async_trait]
pub trait WebhookInbox: Send + Sync {
    /// Persist a verified delivery. Must be durable before the HTTP
    /// acknowledgement is sent.
    async fn enqueue(
        &self,
        delivery: &WebhookDelivery,
        raw_payload: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<InboxEntry>;

    /// Claim up to `limit` due entries, leasing each for `lease` and counting
    /// the attempt.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<InboxEntry>>;

    async fn mark_done(&self, id: &str) -> Result<()>;

    /// Release the lease and schedule another attempt.
    async fn mark_retry(&self, id: &str, error: &str, next_attempt_at: DateTime<Utc>)
        -> Result<()>;

    /// Park the entry permanently.
    async fn dead_letter(&self, id: &str, error: &str) -> Result<()>;
}
