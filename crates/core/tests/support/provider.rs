//! Scriptable calendar provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meetsync_core::CalendarProvider;
use meetsync_domain::{ExternalEventSnapshot, MeetSyncError, Result, TimeWindow};
use parking_lot::Mutex;

#[derive(Default)]
struct Script {
    events: HashMap<String, Vec<ExternalEventSnapshot>>,
    lookups: HashMap<String, ExternalEventSnapshot>,
    failures: HashMap<String, MeetSyncError>,
    delays: HashMap<String, Duration>,
    registered: Vec<String>,
    fetched: Vec<String>,
}

/// Provider whose responses are keyed by calendar id and access token.
#[derive(Clone, Default)]
pub struct MockCalendarProvider {
    script: Arc<Mutex<Script>>,
}

impl MockCalendarProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_events(&self, calendar_id: &str, events: Vec<ExternalEventSnapshot>) {
        self.script.lock().events.insert(calendar_id.to_string(), events);
    }

    /// Make `fetch_event` return this snapshot (otherwise not found).
    pub fn set_lookup(&self, event: ExternalEventSnapshot) {
        self.script.lock().lookups.insert(event.event_id.clone(), event);
    }

    pub fn fail_token(&self, token: &str, error: MeetSyncError) {
        self.script.lock().failures.insert(token.to_string(), error);
    }

    pub fn delay_token(&self, token: &str, delay: Duration) {
        self.script.lock().delays.insert(token.to_string(), delay);
    }

    pub fn registered(&self) -> Vec<String> {
        self.script.lock().registered.clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.script.lock().fetched.clone()
    }

    fn check(&self, token: &str) -> Result<Option<Duration>> {
        let script = self.script.lock();
        if let Some(err) = script.failures.get(token) {
            return Err(err.clone());
        }
        Ok(script.delays.get(token).copied())
    }
}

#[async_trait]
impl CalendarProvider for MockCalendarProvider {
    async fn fetch_event(
        &self,
        access_token: &str,
        event_id: &str,
    ) -> Result<Option<ExternalEventSnapshot>> {
        if let Some(delay) = self.check(access_token)? {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock();
        script.fetched.push(event_id.to_string());
        Ok(script.lookups.get(event_id).cloned())
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<ExternalEventSnapshot>> {
        if let Some(delay) = self.check(access_token)? {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .script
            .lock()
            .events
            .get(calendar_id)
            .map(|events| events.iter().filter(|e| window.contains(e.start)).cloned().collect())
            .unwrap_or_default())
    }

    async fn register_webhook(&self, url: &str) -> Result<()> {
        let mut script = self.script.lock();
        if !script.registered.iter().any(|u| u == url) {
            script.registered.push(url.to_string());
        }
        Ok(())
    }
}
