//! Domain constants shared across crates.

/// Header carrying the HMAC signature of a webhook delivery.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-meetsync-signature";

/// Header carrying the unix timestamp (seconds) the delivery was signed at.
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "x-meetsync-timestamp";

/// Prefix of the signature header value.
pub const WEBHOOK_SIGNATURE_PREFIX: &str = "sha256=";

/// Message shown to users when an integration needs to be reconnected.
pub const RECONNECT_MESSAGE: &str = "Reconnect your calendar to resume syncing.";

/// Message shown to users while syncing is temporarily failing.
pub const DEGRADED_MESSAGE: &str =
    "Calendar sync is temporarily delayed. We'll keep retrying automatically.";

/// Message shown to users for a disconnected integration.
pub const DISCONNECTED_MESSAGE: &str = "Calendar disconnected.";

/// Default page size for audit queries.
pub const DEFAULT_CHANGE_PAGE_SIZE: u32 = 50;

/// Upper bound on the audit query page size.
pub const MAX_CHANGE_PAGE_SIZE: u32 = 500;

/// Default poll schedule: every five minutes, on the minute.
pub const DEFAULT_POLL_CRON: &str = "0 */5 * * * *";
