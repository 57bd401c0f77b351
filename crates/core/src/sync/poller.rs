//! Reconciliation poller
//!
//! One cycle walks every active integration, lists its events inside the
//! lookback/lookahead window and applies each to the linked meeting with
//! `synced` provenance. Linked meetings in the window that the listing did
//! not return are fetched one by one so deletions are noticed.
//!
//! Integrations are processed concurrently up to `max_concurrent`; events
//! within one integration are applied sequentially. A failing or slow
//! integration never affects the others.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use futures::stream::{self, StreamExt};
use meetsync_domain::{
    ApplyOutcome, ApplyRequest, CalendarIntegration, ExternalEventSnapshot, IntegrationSyncState,
    MeetSyncError, PollerConfig, Provenance, RemoteObservation, Result, TimeWindow,
};
use tracing::{debug, info, instrument, warn};

use crate::calendar_ports::{CalendarProvider, IntegrationRepository};
use crate::reconcile::ports::{MeetingRepository, ReconciliationStore};
use crate::reconcile::ApplyOptions;
use crate::utils::clock::Clock;

/// Poller tuning.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub lookback: Duration,
    pub lookahead: Duration,
    pub max_concurrent: usize,
    pub integration_timeout: StdDuration,
    pub record_heartbeats: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from(&PollerConfig::default())
    }
}

impl From<&PollerConfig> for PollerSettings {
    fn from(config: &PollerConfig) -> Self {
        Self {
            lookback: Duration::hours(config.lookback_hours),
            lookahead: Duration::hours(config.lookahead_hours),
            max_concurrent: config.max_concurrent_integrations.max(1),
            integration_timeout: StdDuration::from_secs(config.integration_timeout_secs),
            record_heartbeats: config.record_heartbeats,
        }
    }
}

/// Counters for one integration's cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub applied: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub unmatched: usize,
    pub failed: usize,
}

impl SyncCounts {
    fn record(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied(_) => self.applied += 1,
            ApplyOutcome::Heartbeat(_) | ApplyOutcome::Unchanged => self.unchanged += 1,
            ApplyOutcome::Stale
            | ApplyOutcome::Duplicate
            | ApplyOutcome::AlreadyCancelled
            | ApplyOutcome::Abandoned => self.skipped += 1,
        }
    }
}

/// Result of one integration's cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationReport {
    Synced { integration_id: String, counts: SyncCounts },
    /// Provider or storage failure; the integration's state was updated.
    Failed { integration_id: String, state: IntegrationSyncState },
    /// Integration was deactivated mid-cycle.
    Abandoned { integration_id: String, counts: SyncCounts },
    TimedOut { integration_id: String },
}

impl IntegrationReport {
    pub fn integration_id(&self) -> &str {
        match self {
            Self::Synced { integration_id, .. }
            | Self::Failed { integration_id, .. }
            | Self::Abandoned { integration_id, .. }
            | Self::TimedOut { integration_id } => integration_id,
        }
    }
}

/// Result of one full cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub integrations: Vec<IntegrationReport>,
}

impl CycleReport {
    pub fn failures(&self) -> usize {
        self.integrations
            .iter()
            .filter(|r| {
                matches!(r, IntegrationReport::Failed { .. } | IntegrationReport::TimedOut { .. })
            })
            .count()
    }
}

/// Why an integration's cycle stopped early.
enum Interrupt {
    Abandoned(SyncCounts),
    Failed(MeetSyncError),
}

impl From<MeetSyncError> for Interrupt {
    fn from(err: MeetSyncError) -> Self {
        Self::Failed(err)
    }
}

/// Periodic reconciliation against the provider.
pub struct ReconciliationPoller {
    integrations: Arc<dyn IntegrationRepository>,
    meetings: Arc<dyn MeetingRepository>,
    store: Arc<dyn ReconciliationStore>,
    provider: Arc<dyn CalendarProvider>,
    clock: Arc<dyn Clock>,
    settings: PollerSettings,
}

impl ReconciliationPoller {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        meetings: Arc<dyn MeetingRepository>,
        store: Arc<dyn ReconciliationStore>,
        provider: Arc<dyn CalendarProvider>,
        clock: Arc<dyn Clock>,
        settings: PollerSettings,
    ) -> Self {
        Self { integrations, meetings, store, provider, clock, settings }
    }

    /// Run one cycle over every active integration.
    ///
    /// Only listing the integrations can fail the whole cycle; per-integration
    /// failures are isolated and reported.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let active = self.integrations.list_active_integrations().await?;
        debug!(count = active.len(), "Starting reconciliation cycle");

        let integrations = stream::iter(active)
            .map(|integration| self.run_guarded(integration))
            .buffer_unordered(self.settings.max_concurrent)
            .collect::<Vec<_>>()
            .await;

        let report = CycleReport { integrations };
        info!(
            integrations = report.integrations.len(),
            failures = report.failures(),
            "Reconciliation cycle finished"
        );
        Ok(report)
    }

    async fn run_guarded(&self, integration: CalendarIntegration) -> IntegrationReport {
        let integration_id = integration.id.clone();
        match tokio::time::timeout(self.settings.integration_timeout, self.sync_integration(&integration))
            .await
        {
            Ok(report) => report,
            Err(_) => {
                warn!(integration_id = %integration_id, "Integration sync timed out");
                self.mark_failed(&integration_id, IntegrationSyncState::Degraded, "sync timed out")
                    .await;
                IntegrationReport::TimedOut { integration_id }
            }
        }
    }

    #[instrument(skip(self, integration), fields(integration_id = %integration.id))]
    async fn sync_integration(&self, integration: &CalendarIntegration) -> IntegrationReport {
        let started = self.clock.now();
        let integration_id = integration.id.clone();
        match self.reconcile_window(integration).await {
            Ok(counts) if counts.failed == 0 => {
                if let Err(err) = self.integrations.record_sync_success(&integration_id, started).await
                {
                    warn!(error = %err, "Failed to record sync success");
                }
                debug!(?counts, "Integration synced");
                IntegrationReport::Synced { integration_id, counts }
            }
            Ok(counts) => {
                let detail = format!("{} event(s) failed to apply", counts.failed);
                self.mark_failed(&integration_id, IntegrationSyncState::Degraded, &detail).await;
                IntegrationReport::Failed { integration_id, state: IntegrationSyncState::Degraded }
            }
            Err(Interrupt::Abandoned(counts)) => {
                info!("Integration deactivated mid-cycle; abandoning");
                IntegrationReport::Abandoned { integration_id, counts }
            }
            Err(Interrupt::Failed(err)) => {
                let state = failure_state(&err);
                warn!(error = %err, state = %state, "Integration sync failed");
                self.mark_failed(&integration_id, state, &err.to_string()).await;
                IntegrationReport::Failed { integration_id, state }
            }
        }
    }

    async fn reconcile_window(
        &self,
        integration: &CalendarIntegration,
    ) -> std::result::Result<SyncCounts, Interrupt> {
        let window =
            TimeWindow::around(self.clock.now(), self.settings.lookback, self.settings.lookahead);
        let events = self
            .provider
            .list_events(&integration.access_token, &integration.calendar_id, window)
            .await?;

        let mut counts = SyncCounts::default();
        let mut listed = HashSet::with_capacity(events.len());

        for event in events {
            listed.insert(event.event_id.clone());
            self.ensure_active(integration, &counts).await?;
            let Some(meeting) = self.meetings.find_by_event_id(&event.event_id).await? else {
                counts.unmatched += 1;
                continue;
            };
            let payload = snapshot_payload(&event)?;
            self.apply(integration, meeting.id, RemoteObservation::Present(event), payload, &mut counts)
                .await?;
        }

        for meeting in self.meetings.list_linked_in_window(&integration.id, window).await? {
            let Some(event_id) = meeting.calendar_event_id.clone() else {
                continue;
            };
            if listed.contains(&event_id) {
                continue;
            }
            self.ensure_active(integration, &counts).await?;
            let (observation, payload) =
                match self.provider.fetch_event(&integration.access_token, &event_id).await? {
                    Some(event) => {
                        let payload = snapshot_payload(&event)?;
                        (RemoteObservation::Present(event), payload)
                    }
                    None => (
                        RemoteObservation::Missing { event_id: event_id.clone() },
                        serde_json::json!({ "event_id": event_id, "status": "not_found" }),
                    ),
                };
            self.apply(integration, meeting.id, observation, payload, &mut counts).await?;
        }

        // Disconnected after the last apply, or while listing with nothing to apply.
        self.ensure_active(integration, &counts).await?;
        Ok(counts)
    }

    async fn apply(
        &self,
        integration: &CalendarIntegration,
        meeting_id: String,
        observation: RemoteObservation,
        raw_payload: serde_json::Value,
        counts: &mut SyncCounts,
    ) -> std::result::Result<(), Interrupt> {
        let request = ApplyRequest {
            meeting_id,
            observation,
            provenance: Provenance::Synced,
            raw_payload,
            integration_guard: Some(integration.id.clone()),
            observed_at: self.clock.now(),
        };
        let options = ApplyOptions { record_heartbeat: self.settings.record_heartbeats };
        match self.store.apply(&request, &options).await {
            Ok(ApplyOutcome::Abandoned) => Err(Interrupt::Abandoned(counts.clone())),
            Ok(outcome) => {
                debug!(meeting_id = %request.meeting_id, outcome = outcome.label(), "Applied");
                counts.record(&outcome);
                Ok(())
            }
            Err(err) => {
                warn!(meeting_id = %request.meeting_id, error = %err, "Failed to apply event");
                counts.failed += 1;
                Ok(())
            }
        }
    }

    async fn ensure_active(
        &self,
        integration: &CalendarIntegration,
        counts: &SyncCounts,
    ) -> std::result::Result<(), Interrupt> {
        if self.integrations.is_active(&integration.id).await? {
            Ok(())
        } else {
            Err(Interrupt::Abandoned(counts.clone()))
        }
    }

    async fn mark_failed(&self, integration_id: &str, state: IntegrationSyncState, detail: &str) {
        if let Err(err) = self
            .integrations
            .record_sync_failure(integration_id, state, detail, self.clock.now())
            .await
        {
            warn!(integration_id, error = %err, "Failed to record sync failure");
        }
    }
}

/// Authentication failures need the user; everything else is retried.
fn failure_state(err: &MeetSyncError) -> IntegrationSyncState {
    match err {
        MeetSyncError::Auth(_) => IntegrationSyncState::NeedsReconnect,
        _ => IntegrationSyncState::Degraded,
    }
}

fn snapshot_payload(event: &ExternalEventSnapshot) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(event)?)
}
