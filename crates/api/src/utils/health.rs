//! Health report types for `GET /health`

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Overall health of the service
///
/// # Example
/// ```no_run
/// use meetsync_api::utils::health::{ComponentHealth, HealthStatus};
///
/// let status = HealthStatus::from_components(vec![
///     ComponentHealth::healthy("database"),
///     ComponentHealth::unhealthy("webhook_inbox", "3 deliveries dead-lettered"),
/// ]);
///
/// assert_eq!(status.score, 0.5);
/// assert!(!status.is_healthy);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_healthy: bool,

    /// Fraction of healthy components, from 0.0 to 1.0
    pub score: f64,

    pub components: Vec<ComponentHealth>,

    /// Unix timestamp when the check ran
    pub timestamp: i64,
}

impl HealthStatus {
    /// Healthy when every component is.
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let healthy = components.iter().filter(|c| c.is_healthy).count();
        let score =
            if components.is_empty() { 1.0 } else { healthy as f64 / components.len() as f64 };
        Self {
            is_healthy: healthy == components.len(),
            score,
            components,
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Health of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component identifier (e.g. "database", "webhook_inbox")
    pub name: String,

    pub is_healthy: bool,

    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }

    /// Healthy, with an informational note.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_components_is_healthy() {
        let status = HealthStatus::from_components(Vec::new());
        assert!(status.is_healthy);
        assert_eq!(status.score, 1.0);
    }

    #[test]
    fn test_one_failure_marks_unhealthy() {
        let status = HealthStatus::from_components(vec![
            ComponentHealth::healthy("database"),
            ComponentHealth::healthy("webhook_inbox"),
            ComponentHealth::healthy("integrations"),
            ComponentHealth::unhealthy("poller", "stopped"),
        ]);

        assert_eq!(status.score, 0.75);
        assert!(!status.is_healthy);
    }

    #[test]
    fn test_component_constructors() {
        let db = ComponentHealth::healthy("database").with_message("wal");
        assert!(db.is_healthy);
        assert_eq!(db.message.as_deref(), Some("wal"));

        let inbox = ComponentHealth::unhealthy("webhook_inbox", "backlog");
        assert!(!inbox.is_healthy);
    }
}
