//! Reconciliation poller over SQLite against a mocked provider API.

mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use meetsync_core::{
    ChangeLedger, IntegrationReport, IntegrationRepository, ManualClock, PollerSettings,
    ReconciliationPoller,
};
use meetsync_domain::constants::RECONNECT_MESSAGE;
use meetsync_domain::{
    ChangeQuery, ChangeType, IntegrationStatusView, IntegrationSyncState, MeetingStatus,
};
use meetsync_infra::{CalendarApiClient, HttpClient};
use serde_json::json;
use support::{base_time, t, Stores, TestDatabase};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> Arc<CalendarApiClient> {
    let http = HttpClient::builder()
        .timeout(StdDuration::from_secs(5))
        .max_attempts(1)
        .build()
        .unwrap();
    Arc::new(CalendarApiClient::with_http(&server.uri(), None, http).unwrap())
}

fn poller(stores: &Stores, server: &MockServer, timeout: StdDuration) -> ReconciliationPoller {
    ReconciliationPoller::new(
        stores.integrations.clone(),
        stores.meetings.clone(),
        stores.store.clone(),
        provider(server),
        Arc::new(ManualClock::new(base_time())),
        PollerSettings {
            lookback: Duration::hours(24),
            lookahead: Duration::days(7),
            max_concurrent: 2,
            integration_timeout: timeout,
            record_heartbeats: false,
        },
    )
}

fn wire_event(id: &str, title: &str, updated: i64) -> serde_json::Value {
    json!({
        "id": id,
        "calendar_id": "cal",
        "title": title,
        "start_time": t(60).to_rfc3339(),
        "end_time": t(90).to_rfc3339(),
        "updated_at": t(updated).to_rfc3339(),
        "etag": format!("{id}-{updated}"),
        "is_deleted": false
    })
}

#[tokio::test]
async fn slow_integration_does_not_block_the_others() {
    let server = MockServer::start().await;
    let db = TestDatabase::new();
    let stores = db.stores();

    let slow = stores.integration("cal-x").await;
    let fast = stores.integration("cal-y").await;
    let stuck = stores.linked_meeting("X weekly", "ext-x1", Some(&slow.id)).await;
    let synced = stores.linked_meeting("Y weekly", "ext-y1", Some(&fast.id)).await;

    Mock::given(method("GET"))
        .and(path("/calendars/cal-x/events"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [wire_event("ext-x1", "X renamed", 5)] }))
                .set_delay(StdDuration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal-y/events"))
        .and(header("authorization", "Bearer token-cal-y"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [wire_event("ext-y1", "Y renamed", 5)] })),
        )
        .mount(&server)
        .await;

    let report = poller(&stores, &server, StdDuration::from_millis(500)).run_cycle().await.unwrap();

    assert_eq!(report.integrations.len(), 2);
    assert_eq!(report.failures(), 1);
    assert!(report.integrations.iter().any(
        |r| matches!(r, IntegrationReport::TimedOut { integration_id } if *integration_id == slow.id)
    ));

    let y = stores.reload(&synced.id).await;
    assert_eq!(y.title, "Y renamed");
    assert_eq!(y.last_synced_at, Some(base_time()));
    let y_changes =
        stores.ledger.list_changes(&synced.id, &ChangeQuery::default()).await.unwrap();
    assert_eq!(y_changes.len(), 1);
    assert_eq!(y_changes[0].change_type, ChangeType::Synced);

    let x = stores.reload(&stuck.id).await;
    assert_eq!(x.title, "X weekly");
    assert_eq!(x.last_synced_at, None);

    let x_state = stores.integrations.get_integration(&slow.id).await.unwrap().unwrap();
    assert_eq!(x_state.sync_state, IntegrationSyncState::Degraded);
    let y_state = stores.integrations.get_integration(&fast.id).await.unwrap().unwrap();
    assert_eq!(y_state.sync_state, IntegrationSyncState::Healthy);
    assert_eq!(y_state.last_synced_at, Some(base_time()));
}

#[tokio::test]
async fn unlisted_meeting_is_fetched_and_cancelled_when_gone() {
    let server = MockServer::start().await;
    let db = TestDatabase::new();
    let stores = db.stores();
    let integration = stores.integration("cal-1").await;
    let meeting = stores.linked_meeting("Quarterly", "ext-2", Some(&integration.id)).await;

    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events/ext-2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let report = poller(&stores, &server, StdDuration::from_secs(5)).run_cycle().await.unwrap();
    assert_eq!(report.failures(), 0);

    let reloaded = stores.reload(&meeting.id).await;
    assert_eq!(reloaded.status, MeetingStatus::Cancelled);
    assert_eq!(reloaded.calendar_event_id.as_deref(), Some("ext-2"));
    let changes =
        stores.ledger.list_changes(&meeting.id, &ChangeQuery::default()).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, ChangeType::Deleted);
}

#[tokio::test]
async fn rejected_credentials_ask_the_user_to_reconnect() {
    let server = MockServer::start().await;
    let db = TestDatabase::new();
    let stores = db.stores();
    let integration = stores.integration("cal-1").await;

    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/events"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked: abc123"))
        .mount(&server)
        .await;

    poller(&stores, &server, StdDuration::from_secs(5)).run_cycle().await.unwrap();

    let stored = stores.integrations.get_integration(&integration.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_state, IntegrationSyncState::NeedsReconnect);
    let view = IntegrationStatusView::from(&stored);
    assert_eq!(view.message.as_deref(), Some(RECONNECT_MESSAGE));
    assert!(!serde_json::to_string(&view).unwrap().contains("abc123"));
}

#[tokio::test]
async fn repeated_cycles_are_idempotent() {
    let server = MockServer::start().await;
    let db = TestDatabase::new();
    let stores = db.stores();
    let integration = stores.integration("cal-1").await;
    let meeting = stores.linked_meeting("Kickoff", "ext-1", Some(&integration.id)).await;

    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/events"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [wire_event("ext-1", "Kickoff (moved)", 5)] })),
        )
        .mount(&server)
        .await;

    let poller = poller(&stores, &server, StdDuration::from_secs(5));
    poller.run_cycle().await.unwrap();
    poller.run_cycle().await.unwrap();

    let changes =
        stores.ledger.list_changes(&meeting.id, &ChangeQuery::default()).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(stores.reload(&meeting.id).await.title, "Kickoff (moved)");
}

#[tokio::test]
async fn disconnected_integration_is_never_marked_synced() {
    let db = TestDatabase::new();
    let stores = db.stores();
    let integration = stores.integration("cal-1").await;
    assert!(stores.integrations.deactivate(&integration.id).await.unwrap());

    stores.integrations.record_sync_success(&integration.id, t(5)).await.unwrap();

    let stored = stores.integrations.get_integration(&integration.id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert!(stored.last_synced_at.is_none());
}

#[tokio::test]
async fn empty_calendar_disconnected_while_listing_is_abandoned() {
    let server = MockServer::start().await;
    let db = TestDatabase::new();
    let stores = db.stores();
    let integration = stores.integration("cal-1").await;

    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/events"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(StdDuration::from_millis(300))
                .set_body_json(json!({ "results": [] })),
        )
        .mount(&server)
        .await;

    let poller = poller(&stores, &server, StdDuration::from_secs(5));
    let disconnect = async {
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        stores.integrations.deactivate(&integration.id).await.unwrap();
    };
    let (report, ()) = tokio::join!(poller.run_cycle(), disconnect);

    let report = report.unwrap();
    assert!(matches!(report.integrations[..], [IntegrationReport::Abandoned { .. }]));
    let stored = stores.integrations.get_integration(&integration.id).await.unwrap().unwrap();
    assert!(stored.last_synced_at.is_none());
}
