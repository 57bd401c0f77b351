//! Configuration loader
//!
//! ## Loading Strategy
//! 1. `MEETSYNC_CONFIG` names a file explicitly, otherwise standard paths
//!    are probed for `config.{toml,json}` and `meetsync.{toml,json}`
//! 2. With no file, every section starts from its defaults
//! 3. `MEETSYNC_*` environment variables override individual fields
//!
//! ## Environment Variables
//! - `MEETSYNC_DB_PATH`, `MEETSYNC_DB_POOL_SIZE`, `MEETSYNC_DB_BUSY_TIMEOUT_MS`
//! - `MEETSYNC_POLLER_ENABLED`, `MEETSYNC_POLLER_CRON`,
//!   `MEETSYNC_POLLER_LOOKBACK_HOURS`, `MEETSYNC_POLLER_LOOKAHEAD_HOURS`,
//!   `MEETSYNC_POLLER_RECORD_HEARTBEATS`
//! - `MEETSYNC_WEBHOOK_SECRET`, `MEETSYNC_WEBHOOK_TOLERANCE_SECS`,
//!   `MEETSYNC_WEBHOOK_PUBLIC_URL`, `MEETSYNC_WEBHOOK_MAX_ATTEMPTS`
//! - `MEETSYNC_PROVIDER_BASE_URL`, `MEETSYNC_PROVIDER_API_KEY`,
//!   `MEETSYNC_PROVIDER_TIMEOUT_SECS`
//! - `MEETSYNC_BIND_ADDR`, `MEETSYNC_JSON_LOGS`
//!
//! `.env` files are read by the binary (via `dotenvy`) before `load` runs.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use meetsync_domain::{Config, MeetSyncError, Result};

/// Load configuration: file (explicit or probed) plus environment overrides.
///
/// # Errors
/// Returns `MeetSyncError::Config` if the named file is missing, a file
/// cannot be parsed, an override has an invalid value or the result fails
/// validation.
pub fn load() -> Result<Config> {
    let explicit = std::env::var("MEETSYNC_CONFIG").ok().map(PathBuf::from);
    let base = match explicit.or_else(probe_config_paths) {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found; starting from defaults");
            Config::default()
        }
    };

    let config = apply_env_overrides(base, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Defaults plus environment overrides only.
///
/// # Errors
/// Returns `MeetSyncError::Config` for invalid override values.
pub fn load_from_env() -> Result<Config> {
    let config = apply_env_overrides(Config::default(), |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected
/// by extension (`.toml` or `.json`); missing fields take their defaults.
///
/// # Errors
/// Returns `MeetSyncError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MeetSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MeetSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| MeetSyncError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| MeetSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| MeetSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(MeetSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the working directory, its parents and the executable's directory
/// for a config file. Returns the first one found.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.toml", "config.json", "meetsync.toml", "meetsync.json"];

    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter().flat_map(|dir| NAMES.iter().map(move |name| dir.join(name))).find(|p| p.exists())
}

/// Apply `MEETSYNC_*` overrides read through `lookup`.
///
/// # Errors
/// Returns `MeetSyncError::Config` naming the variable with a bad value.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("MEETSYNC_DB_PATH") {
        config.database.path = v;
    }
    override_parsed(&get, "MEETSYNC_DB_POOL_SIZE", &mut config.database.pool_size)?;
    override_parsed(&get, "MEETSYNC_DB_BUSY_TIMEOUT_MS", &mut config.database.busy_timeout_ms)?;

    override_bool(&get, "MEETSYNC_POLLER_ENABLED", &mut config.poller.enabled);
    if let Some(v) = get("MEETSYNC_POLLER_CRON") {
        config.poller.cron = v;
    }
    override_parsed(&get, "MEETSYNC_POLLER_LOOKBACK_HOURS", &mut config.poller.lookback_hours)?;
    override_parsed(&get, "MEETSYNC_POLLER_LOOKAHEAD_HOURS", &mut config.poller.lookahead_hours)?;
    override_bool(&get, "MEETSYNC_POLLER_RECORD_HEARTBEATS", &mut config.poller.record_heartbeats);

    if let Some(v) = get("MEETSYNC_WEBHOOK_SECRET") {
        config.webhook.secret = v;
    }
    override_parsed(&get, "MEETSYNC_WEBHOOK_TOLERANCE_SECS", &mut config.webhook.tolerance_secs)?;
    if let Some(v) = get("MEETSYNC_WEBHOOK_PUBLIC_URL") {
        config.webhook.public_url = Some(v);
    }
    override_parsed(&get, "MEETSYNC_WEBHOOK_MAX_ATTEMPTS", &mut config.webhook.max_attempts)?;

    if let Some(v) = get("MEETSYNC_PROVIDER_BASE_URL") {
        config.provider.base_url = v;
    }
    if let Some(v) = get("MEETSYNC_PROVIDER_API_KEY") {
        config.provider.api_key = Some(v);
    }
    override_parsed(&get, "MEETSYNC_PROVIDER_TIMEOUT_SECS", &mut config.provider.timeout_secs)?;

    if let Some(v) = get("MEETSYNC_BIND_ADDR") {
        config.server.bind_addr = v;
    }
    override_bool(&get, "MEETSYNC_JSON_LOGS", &mut config.server.json_logs);

    Ok(config)
}

fn override_parsed<G, T>(get: &G, key: &str, target: &mut T) -> Result<()>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = get(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| MeetSyncError::Config(format!("Invalid value for {}: {}", key, e)))?;
    }
    Ok(())
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn override_bool<G>(get: &G, key: &str, target: &mut bool)
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *target = matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.database.path.trim().is_empty() {
        return Err(MeetSyncError::Config("database.path must not be empty".into()));
    }
    if config.database.pool_size == 0 {
        return Err(MeetSyncError::Config("database.pool_size must be at least 1".into()));
    }
    if config.webhook.tolerance_secs <= 0 {
        return Err(MeetSyncError::Config("webhook.tolerance_secs must be positive".into()));
    }
    if config.poller.lookback_hours < 0 || config.poller.lookahead_hours < 0 {
        return Err(MeetSyncError::Config("poller window hours must not be negative".into()));
    }
    if config.webhook.secret.is_empty() {
        tracing::warn!("webhook.secret is not set; all webhook deliveries will be rejected");
    }
    Ok(())
}
