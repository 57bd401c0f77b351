//! Calendar integration port interfaces

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_domain::{
    CalendarIntegration, ExternalEventSnapshot, IntegrationSyncState, NewIntegration, Result,
    TimeWindow,
};

/// Trait for calendar provider operations
///
/// Implementations map authentication failures to `MeetSyncError::Auth` and
/// transient transport failures to `MeetSyncError::Network`; the poller uses
/// that split to pick the integration's sync state.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Fetch one event. `Ok(None)` when the provider reports it not found.
    async fn fetch_event(
        &self,
        access_token: &str,
        event_id: &str,
    ) -> Result<Option<ExternalEventSnapshot>>;

    /// List every event of a calendar that starts inside `window`.
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<ExternalEventSnapshot>>;

    /// Register the account-level webhook URL. Idempotent.
    async fn register_webhook(&self, url: &str) -> Result<()>;
}

/// Trait for integration persistence
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    async fn create_integration(&self, new: &NewIntegration) -> Result<CalendarIntegration>;

    async fn get_integration(&self, id: &str) -> Result<Option<CalendarIntegration>>;

    async fn list_active_integrations(&self) -> Result<Vec<CalendarIntegration>>;

    async fn is_active(&self, id: &str) -> Result<bool>;

    /// Deactivate an integration. Returns `false` if it does not exist.
    async fn deactivate(&self, id: &str) -> Result<bool>;

    /// Mark a completed cycle: state healthy, `last_synced_at = at`.
    async fn record_sync_success(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Mark a failed cycle without advancing `last_synced_at`.
    async fn record_sync_failure(
        &self,
        id: &str,
        state: IntegrationSyncState,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
