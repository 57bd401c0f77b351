//! Calendar integrations and their sync health.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEGRADED_MESSAGE, DISCONNECTED_MESSAGE, RECONNECT_MESSAGE};
use crate::impl_domain_status_conversions;

/// Health of an integration as seen by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationSyncState {
    Healthy,
    Degraded,
    NeedsReconnect,
}

impl_domain_status_conversions!(IntegrationSyncState {
    Healthy => "healthy",
    Degraded => "degraded",
    NeedsReconnect => "needs_reconnect",
});

impl IntegrationSyncState {
    /// Message safe to show to the integration's owner.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Healthy => None,
            Self::Degraded => Some(DEGRADED_MESSAGE),
            Self::NeedsReconnect => Some(RECONNECT_MESSAGE),
        }
    }
}

/// A user's connection to a calendar provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarIntegration {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub calendar_id: String,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_state: IntegrationSyncState,
    /// Internal failure detail; never returned to users.
    #[serde(skip_serializing)]
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for CalendarIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarIntegration")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("calendar_id", &self.calendar_id)
            .field("is_active", &self.is_active)
            .field("access_token", &"[REDACTED]")
            .field("last_synced_at", &self.last_synced_at)
            .field("sync_state", &self.sync_state)
            .field("last_error", &self.last_error)
            .field("last_error_at", &self.last_error_at)
            .finish()
    }
}

/// Input for connecting a calendar.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct NewIntegration {
    pub user_id: String,
    pub provider: String,
    pub calendar_id: String,
    pub access_token: String,
}

impl fmt::Debug for NewIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewIntegration")
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("calendar_id", &self.calendar_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// User-facing integration status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStatusView {
    pub integration_id: String,
    pub provider: String,
    pub is_active: bool,
    pub sync_state: IntegrationSyncState,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl From<&CalendarIntegration> for IntegrationStatusView {
    fn from(integration: &CalendarIntegration) -> Self {
        let message = if integration.is_active {
            integration.sync_state.user_message()
        } else {
            Some(DISCONNECTED_MESSAGE)
        };
        Self {
            integration_id: integration.id.clone(),
            provider: integration.provider.clone(),
            is_active: integration.is_active,
            sync_state: integration.sync_state,
            last_synced_at: integration.last_synced_at,
            message: message.map(str::to_string),
        }
    }
}
