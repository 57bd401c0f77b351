//! Webhook processing
//!
//! Turns one durable inbox entry into an apply call. Signature checks and
//! decoding happen at the HTTP boundary before an entry is ever queued.

use std::sync::Arc;

use meetsync_domain::{ApplyOutcome, ApplyRequest, InboxEntry, Provenance, Result};
use tracing::{debug, info, instrument};

use crate::reconcile::ports::{MeetingRepository, ReconciliationStore};
use crate::reconcile::ApplyOptions;
use crate::utils::clock::Clock;

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookDisposition {
    /// No meeting is linked to the event (new event or orphan).
    Unmatched,
    Applied(ApplyOutcome),
}

/// Applies queued webhook deliveries with `webhook_sync` provenance.
pub struct WebhookProcessor {
    meetings: Arc<dyn MeetingRepository>,
    store: Arc<dyn ReconciliationStore>,
    clock: Arc<dyn Clock>,
}

impl WebhookProcessor {
    pub fn new(
        meetings: Arc<dyn MeetingRepository>,
        store: Arc<dyn ReconciliationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { meetings, store, clock }
    }

    /// Process one entry. Errors are transient and the entry should be
    /// retried.
    #[instrument(skip(self, entry), fields(entry_id = %entry.id, event_id = %entry.event_id))]
    pub async fn process(&self, entry: &InboxEntry) -> Result<WebhookDisposition> {
        let Some(meeting) = self.meetings.find_by_event_id(entry.delivery.event_id()).await? else {
            debug!(kind = %entry.delivery.kind, "No meeting linked to event; skipping");
            return Ok(WebhookDisposition::Unmatched);
        };

        let request = ApplyRequest {
            meeting_id: meeting.id.clone(),
            observation: entry.delivery.observation.clone(),
            provenance: Provenance::WebhookSync,
            raw_payload: entry.raw_payload.clone(),
            integration_guard: meeting.integration_id.clone(),
            observed_at: self.clock.now(),
        };
        let outcome = self.store.apply(&request, &ApplyOptions::default()).await?;
        info!(meeting_id = %meeting.id, outcome = outcome.label(), "Webhook delivery applied");
        Ok(WebhookDisposition::Applied(outcome))
    }
}
