//! Tracing setup and request outcome logging

use std::time::Duration;

use meetsync_domain::MeetSyncError;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,meetsync=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    if result.is_err() {
        warn!("tracing subscriber already installed");
    }
}

/// Log the outcome of a request with structured fields.
///
/// `route` must be a stable identifier without ids or other user data.
#[inline]
pub fn log_request_outcome(route: &str, elapsed: Duration, error: Option<&MeetSyncError>) {
    let duration_ms = elapsed.as_millis() as u64;

    match error {
        None => info!(route, duration_ms, "request_success"),
        Some(err) => warn!(route, duration_ms, error_type = error_label(err), "request_failure"),
    }
}

/// Stable label for an error, suitable for logs and metrics.
#[inline]
pub fn error_label(error: &MeetSyncError) -> &'static str {
    match error {
        MeetSyncError::Database(_) => "database",
        MeetSyncError::Config(_) => "config",
        MeetSyncError::Network(_) => "network",
        MeetSyncError::Auth(_) => "auth",
        MeetSyncError::Security(_) => "security",
        MeetSyncError::NotFound(_) => "not_found",
        MeetSyncError::InvalidInput(_) => "invalid_input",
        MeetSyncError::Conflict(_) => "conflict",
        MeetSyncError::Internal(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(error_label(&MeetSyncError::NotFound("m".into())), "not_found");
        assert_eq!(error_label(&MeetSyncError::Security("sig".into())), "security");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_tracing(false);
        init_tracing(true);
    }
}
