//! Application configuration
//!
//! Every section has serde defaults so partial config files are accepted.
//! Secrets (`webhook.secret`, `provider.api_key`) are redacted from `Debug`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_POLL_CRON;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// SQLite database settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Reconciliation poller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    #[serde(default = "default_poll_cron")]
    pub cron: String,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: i64,
    #[serde(default = "default_max_concurrent_integrations")]
    pub max_concurrent_integrations: usize,
    #[serde(default = "default_integration_timeout_secs")]
    pub integration_timeout_secs: u64,
    /// Append a `synced` row even when nothing changed.
    #[serde(default)]
    pub record_heartbeats: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_poll_cron(),
            lookback_hours: default_lookback_hours(),
            lookahead_hours: default_lookahead_hours(),
            max_concurrent_integrations: default_max_concurrent_integrations(),
            integration_timeout_secs: default_integration_timeout_secs(),
            record_heartbeats: false,
        }
    }
}

/// Webhook verification and inbox worker settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared HMAC secret. Empty rejects every delivery.
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: i64,
    /// Public URL registered with the provider.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_worker_interval_ms")]
    pub worker_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_lease_secs")]
    pub lease_secs: i64,
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            tolerance_secs: default_tolerance_secs(),
            public_url: None,
            worker_interval_ms: default_worker_interval_ms(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            lease_secs: default_lease_secs(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .field("public_url", &self.public_url)
            .field("worker_interval_ms", &self.worker_interval_ms)
            .field("batch_size", &self.batch_size)
            .field("max_attempts", &self.max_attempts)
            .field("lease_secs", &self.lease_secs)
            .field("retry_initial_ms", &self.retry_initial_ms)
            .field("retry_max_ms", &self.retry_max_ms)
            .finish()
    }
}

/// Calendar provider API settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Account-level key used for webhook registration.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            timeout_secs: default_provider_timeout_secs(),
            max_retries: default_provider_max_retries(),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), json_logs: false }
    }
}

fn default_true() -> bool {
    true
}
fn default_db_path() -> String {
    "meetsync.db".to_string()
}
fn default_pool_size() -> u32 {
    8
}
fn default_busy_timeout_ms() -> u64 {
    5_000
}
fn default_poll_cron() -> String {
    DEFAULT_POLL_CRON.to_string()
}
fn default_lookback_hours() -> i64 {
    24
}
fn default_lookahead_hours() -> i64 {
    24 * 14
}
fn default_max_concurrent_integrations() -> usize {
    4
}
fn default_integration_timeout_secs() -> u64 {
    60
}
fn default_tolerance_secs() -> i64 {
    300
}
fn default_worker_interval_ms() -> u64 {
    1_000
}
fn default_batch_size() -> usize {
    25
}
fn default_max_attempts() -> u32 {
    8
}
fn default_lease_secs() -> i64 {
    60
}
fn default_retry_initial_ms() -> u64 {
    1_000
}
fn default_retry_max_ms() -> u64 {
    5 * 60 * 1_000
}
fn default_provider_base_url() -> String {
    "https://api.calendar.example.com/v1".to_string()
}
fn default_provider_timeout_secs() -> u64 {
    30
}
fn default_provider_max_retries() -> u32 {
    3
}
fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"database":{"path":"/tmp/x.db"},"poller":{"record_heartbeats":true}}"#)
                .unwrap();
        assert_eq!(config.database.path, "/tmp/x.db");
        assert_eq!(config.database.pool_size, 8);
        assert!(config.poller.record_heartbeats);
        assert_eq!(config.poller.cron, "0 */5 * * * *");
        assert_eq!(config.webhook.max_attempts, 8);
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = Config::default();
        config.webhook.secret = "whsec_live".into();
        config.provider.api_key = Some("pk_live".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("whsec_live"));
        assert!(!rendered.contains("pk_live"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
