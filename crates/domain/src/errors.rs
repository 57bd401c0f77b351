//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for MeetSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MeetSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeetSyncError {
    /// Whether retrying the failed operation may succeed.
    ///
    /// Network and database failures are transient; everything else needs
    /// a change of input or credentials first.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Database(_))
    }
}

impl From<serde_json::Error> for MeetSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON error: {err}"))
    }
}

/// Result type alias for MeetSync operations
pub type Result<T> = std::result::Result<T, MeetSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let err = MeetSyncError::NotFound("meeting m-1".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "NotFound");
        assert_eq!(json["message"], "meeting m-1");
    }

    #[test]
    fn transient_classification() {
        assert!(MeetSyncError::Network("reset".into()).is_transient());
        assert!(MeetSyncError::Database("locked".into()).is_transient());
        assert!(!MeetSyncError::Auth("expired".into()).is_transient());
        assert!(!MeetSyncError::InvalidInput("bad".into()).is_transient());
    }
}
