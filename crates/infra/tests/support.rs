//! Shared helpers for `meetsync-infra` integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use meetsync_core::{IntegrationRepository, MeetingRepository};
use meetsync_domain::{
    ApplyRequest, CalendarIntegration, ExternalEventSnapshot, Meeting, NewIntegration, NewMeeting,
    Provenance, RemoteObservation,
};
use meetsync_infra::database::{
    DbManager, SqliteChangeLedger, SqliteIntegrationRepository, SqliteMeetingRepository,
    SqliteReconciliationStore, SqliteWebhookInbox,
};
use serde_json::json;
use tempfile::TempDir;

/// Temporary database that keeps its directory alive for the test's
/// duration.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Fresh migrated database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("meetsync-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn execute_batch(&self, sql: &str) {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.query_row(sql, [], |row| row.get(0)).expect("count query should succeed")
    }

    pub fn stores(&self) -> Stores {
        let db = Arc::clone(&self.manager);
        Stores {
            meetings: Arc::new(SqliteMeetingRepository::new(db.clone())),
            ledger: Arc::new(SqliteChangeLedger::new(db.clone())),
            integrations: Arc::new(SqliteIntegrationRepository::new(db.clone())),
            store: Arc::new(SqliteReconciliationStore::new(db.clone())),
            inbox: Arc::new(SqliteWebhookInbox::new(db)),
        }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Every SQLite adapter over one database.
pub struct Stores {
    pub meetings: Arc<SqliteMeetingRepository>,
    pub ledger: Arc<SqliteChangeLedger>,
    pub integrations: Arc<SqliteIntegrationRepository>,
    pub store: Arc<SqliteReconciliationStore>,
    pub inbox: Arc<SqliteWebhookInbox>,
}

impl Stores {
    pub async fn integration(&self, calendar_id: &str) -> CalendarIntegration {
        self.integrations
            .create_integration(&NewIntegration {
                user_id: "user-1".into(),
                provider: "example".into(),
                calendar_id: calendar_id.into(),
                access_token: format!("token-{calendar_id}"),
            })
            .await
            .expect("integration should be created")
    }

    pub async fn linked_meeting(
        &self,
        title: &str,
        event_id: &str,
        integration_id: Option<&str>,
    ) -> Meeting {
        self.meetings
            .create_meeting(&NewMeeting {
                title: title.into(),
                date: t(60),
                duration_minutes: 30,
                calendar_event_id: Some(event_id.into()),
                integration_id: integration_id.map(str::to_string),
            })
            .await
            .expect("meeting should be created")
    }

    pub async fn reload(&self, meeting_id: &str) -> Meeting {
        self.meetings
            .get_meeting(meeting_id)
            .await
            .expect("meeting lookup should succeed")
            .expect("meeting should exist")
    }
}

/// Fixed reference instant.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

/// [`base_time`] plus `minutes`.
pub fn t(minutes: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minutes)
}

/// Remote event starting at `t(60)` and lasting `duration` minutes,
/// last modified at `t(updated)`.
pub fn remote(event_id: &str, title: &str, duration: i64, updated: i64) -> ExternalEventSnapshot {
    ExternalEventSnapshot {
        event_id: event_id.into(),
        calendar_id: Some("cal-1".into()),
        title: title.into(),
        start: t(60),
        end: t(60 + duration),
        updated_at: Some(t(updated)),
        revision: Some(format!("{event_id}-r{updated}")),
        deleted: false,
    }
}

pub fn request(
    meeting_id: &str,
    observation: RemoteObservation,
    provenance: Provenance,
    observed_at: DateTime<Utc>,
) -> ApplyRequest {
    let raw_payload = match &observation {
        RemoteObservation::Present(snapshot) => serde_json::to_value(snapshot).unwrap(),
        RemoteObservation::Missing { event_id } => json!({ "event_id": event_id, "status": "not_found" }),
    };
    ApplyRequest {
        meeting_id: meeting_id.into(),
        observation,
        provenance,
        raw_payload,
        integration_guard: None,
        observed_at,
    }
}
