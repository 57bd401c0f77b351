//! Calendar provider REST client
//!
//! Implements the core `CalendarProvider` port over the provider's HTTP API.
//! Event reads use the integration's bearer token; webhook registration
//! uses the account-level API key.

use std::time::Duration;

use async_trait::async_trait;
use meetsync_core::CalendarProvider;
use meetsync_domain::{ExternalEventSnapshot, MeetSyncError, ProviderConfig, Result, TimeWindow};
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use super::types::{EventPage, ProviderEvent, RegisterWebhookRequest};
use crate::errors::conversions::{status_error, to_domain};
use crate::http::HttpClient;

/// Upper bound on pages followed by one listing.
const MAX_PAGES: usize = 100;

/// Provider API client.
#[derive(Clone)]
pub struct CalendarApiClient {
    http: HttpClient,
    base_url: Url,
    api_key: Option<String>,
}

impl CalendarApiClient {
    /// Build a client from the `[provider]` configuration section.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_attempts(config.max_retries as usize + 1)
            .user_agent(concat!("meetsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http(&config.base_url, config.api_key.clone(), http)
    }

    /// Build a client around an existing [`HttpClient`].
    pub fn with_http(base_url: &str, api_key: Option<String>, http: HttpClient) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| MeetSyncError::Config(format!("invalid provider base_url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MeetSyncError::Config("provider base_url cannot be a base".into()));
        }
        Ok(Self { http, base_url, api_key })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| MeetSyncError::Config("provider base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: TimeWindow,
        cursor: Option<&str>,
    ) -> Result<EventPage> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let mut query = vec![
            ("time_min", window.start.to_rfc3339()),
            ("time_max", window.end.to_rfc3339()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let request = self.http.request(Method::GET, url).bearer_auth(access_token).query(&query);
        let response = ensure_success(self.http.send(request).await?)?;
        response.json::<EventPage>().await.map_err(to_domain)
    }
}

fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(status))
    }
}

#[async_trait]
impl CalendarProvider for CalendarApiClient {
    #[instrument(skip(self, access_token))]
    async fn fetch_event(
        &self,
        access_token: &str,
        event_id: &str,
    ) -> Result<Option<ExternalEventSnapshot>> {
        let url = self.endpoint(&["events", event_id])?;
        let request = self.http.request(Method::GET, url).bearer_auth(access_token);
        let response = self.http.send(request).await?;

        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            debug!("Event not found at provider");
            return Ok(None);
        }
        let event: ProviderEvent = ensure_success(response)?.json().await.map_err(to_domain)?;
        event.into_snapshot().map(Some)
    }

    #[instrument(skip(self, access_token, window))]
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<ExternalEventSnapshot>> {
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.get_page(access_token, calendar_id, window, cursor.as_deref()).await?;
            for event in page.results {
                let event_id = event.id.clone();
                match event.into_snapshot() {
                    Ok(snapshot) => events.push(snapshot),
                    Err(err) => warn!(event_id = %event_id, error = %err, "Skipping malformed event"),
                }
            }
            match page.next {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => {
                    debug!(count = events.len(), "Listed provider events");
                    return Ok(events);
                }
            }
        }

        warn!(max_pages = MAX_PAGES, "Event listing truncated");
        Ok(events)
    }

    #[instrument(skip(self))]
    async fn register_webhook(&self, url: &str) -> Result<()> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            MeetSyncError::Config("provider api_key is required to register webhooks".into())
        })?;
        Url::parse(url)
            .map_err(|err| MeetSyncError::InvalidInput(format!("invalid webhook url: {err}")))?;

        let endpoint = self.endpoint(&["webhooks"])?;
        let request = self
            .http
            .request(Method::PUT, endpoint)
            .bearer_auth(api_key)
            .json(&RegisterWebhookRequest { url });
        ensure_success(self.http.send(request).await?)?;
        debug!("Webhook registered with provider");
        Ok(())
    }
}
