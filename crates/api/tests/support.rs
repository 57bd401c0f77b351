//! Shared helpers for `meetsync-api` route tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use meetsync_api::{router, AppContext};
use meetsync_core::{Clock, IntegrationRepository, ManualClock, MeetingRepository};
use meetsync_domain::constants::{WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER};
use meetsync_domain::{CalendarIntegration, Config, Meeting, NewIntegration, NewMeeting};
use meetsync_infra::{CalendarApiClient, DbManager, HttpClient, WebhookVerifier};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const SECRET: &str = "whsec_test";

/// Fixed reference instant.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

/// [`base_time`] plus `minutes`.
pub fn t(minutes: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minutes)
}

/// Application wired over a temporary database, a manual clock and a
/// provider at `provider_url`.
pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub clock: Arc<ManualClock>,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn new(provider_url: &str) -> Self {
        Self::with_config(provider_url, test_config())
    }

    pub fn with_config(provider_url: &str, config: Config) -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db = DbManager::new(temp_dir.path().join("meetsync-api.db"), 4)
            .expect("db manager should be created");
        db.run_migrations().expect("migrations should apply");

        let http = HttpClient::builder()
            .timeout(StdDuration::from_secs(5))
            .max_attempts(1)
            .build()
            .unwrap();
        let provider =
            CalendarApiClient::with_http(provider_url, Some("api-key".into()), http).unwrap();
        let clock = Arc::new(ManualClock::new(base_time()));
        let ctx = AppContext::with_parts(config, Arc::new(db), Arc::new(provider), clock.clone());

        Self { ctx: Arc::new(ctx), clock, _temp_dir: temp_dir }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.ctx))
    }

    /// Send one request and decode the JSON response body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// POST a webhook signed with [`SECRET`] at the clock's current time.
    pub async fn deliver(&self, body: &Value) -> (StatusCode, Value) {
        let raw = body.to_string();
        let timestamp = self.clock_now().timestamp();
        let signature = WebhookVerifier::new(SECRET, Duration::minutes(5))
            .sign(timestamp, raw.as_bytes())
            .unwrap();
        let request = Request::post("/webhooks/calendar")
            .header("content-type", "application/json")
            .header(WEBHOOK_SIGNATURE_HEADER, signature)
            .header(WEBHOOK_TIMESTAMP_HEADER, timestamp.to_string())
            .body(Body::from(raw))
            .unwrap();
        self.send(request).await
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn integration(&self, calendar_id: &str) -> CalendarIntegration {
        self.ctx
            .integrations
            .create_integration(&NewIntegration {
                user_id: "user-1".into(),
                provider: "example".into(),
                calendar_id: calendar_id.into(),
                access_token: format!("token-{calendar_id}"),
            })
            .await
            .expect("integration should be created")
    }

    pub async fn linked_meeting(&self, title: &str, event_id: &str) -> Meeting {
        self.ctx
            .meetings
            .create_meeting(&NewMeeting {
                title: title.into(),
                date: t(60),
                duration_minutes: 30,
                calendar_event_id: Some(event_id.into()),
                integration_id: None,
            })
            .await
            .expect("meeting should be created")
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.webhook.secret = SECRET.into();
    config.webhook.tolerance_secs = 300;
    config
}

/// Provider webhook body for `event_id`.
pub fn webhook_body(kind: &str, event_id: &str, title: &str, updated: i64) -> Value {
    serde_json::json!({
        "type": kind,
        "event": {
            "id": event_id,
            "calendar_id": "cal-1",
            "title": title,
            "start_time": t(60).to_rfc3339(),
            "end_time": t(90).to_rfc3339(),
            "updated_at": t(updated).to_rfc3339(),
            "etag": format!("{event_id}-{updated}"),
            "is_deleted": kind == "event.deleted"
        }
    })
}
