//! Retrying HTTP client for calendar provider calls
//!
//! Every provider request goes through [`HttpClient::send`]. Transient
//! failures (5xx, 429, connect errors, timeouts) are retried with exponential
//! backoff; a `Retry-After` from the provider overrides the computed delay
//! but never exceeds the backoff ceiling. Any other response is handed back
//! untouched so the caller can map its status.

use std::time::Duration;

use meetsync_common::{Backoff, Jitter};
use meetsync_domain::MeetSyncError;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, IntoUrl, Method, RequestBuilder, Response, StatusCode, Url};
use tracing::{debug, warn};

use crate::errors::conversions::to_domain;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_attempts: u32,
    backoff: Backoff,
}

/// What to do after one attempt.
enum Outcome {
    Done(Response),
    Retry { after: Option<Duration> },
    Fail(reqwest::Error),
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn new() -> Result<Self, MeetSyncError> {
        Self::builder().build()
    }

    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send `builder`, retrying transient failures.
    ///
    /// After the last attempt a retryable status is returned as a response
    /// and a retryable transport error as `Network`.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, MeetSyncError> {
        let mut attempt = 1;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| MeetSyncError::Internal("streaming request bodies cannot be retried".into()))?
                .build()
                .map_err(to_domain)?;
            let target = format!("{} {}", request.method(), loggable(request.url()));
            let last = attempt >= self.max_attempts;

            let outcome = match self.client.execute(request).await {
                Ok(response) if last || !retryable_status(response.status()) => Outcome::Done(response),
                Ok(response) => Outcome::Retry { after: retry_after(&response) },
                Err(err) if last || !retryable_error(&err) => Outcome::Fail(err),
                Err(err) => {
                    debug!(%target, attempt, error = %err, "provider request failed");
                    Outcome::Retry { after: None }
                }
            };

            match outcome {
                Outcome::Done(response) => {
                    debug!(%target, attempt, status = %response.status(), "provider responded");
                    return Ok(response);
                }
                Outcome::Fail(err) => {
                    warn!(%target, attempt, error = %err, "provider request gave up");
                    return Err(to_domain(err));
                }
                Outcome::Retry { after } => {
                    let delay = after
                        .map(|hint| hint.min(self.backoff.max_delay()))
                        .unwrap_or_else(|| self.backoff.delay_for(attempt));
                    debug!(%target, attempt, ?delay, "retrying provider request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts including the first; at least one.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = u32::try_from(attempts).unwrap_or(u32::MAX).max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, MeetSyncError> {
        let mut client = Client::builder().timeout(self.timeout).no_proxy();
        if let Some(agent) = self.user_agent {
            client = client.user_agent(agent);
        }

        Ok(HttpClient {
            client: client.build().map_err(to_domain)?,
            max_attempts: self.max_attempts,
            backoff: Backoff::exponential(self.base_backoff, self.max_backoff)
                .with_jitter(Jitter::Equal),
        })
    }
}

fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

/// `Retry-After` in delta-seconds. HTTP-date values are ignored.
fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Query strings can carry tokens and window bounds; keep them out of logs.
fn loggable(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.into()
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(attempts: usize) -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .max_backoff(Duration::from_millis(50))
            .max_attempts(attempts)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn provider_outage_is_retried_until_it_recovers() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(move |_: &wiremock::Request| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] }))
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let http = client(3);
        let response =
            http.send(http.request(Method::GET, format!("{}/events", server.uri()))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn last_retryable_status_is_returned_to_the_caller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let http = client(2);
        let response = http.send(http.request(Method::GET, server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn retry_after_is_capped_by_the_backoff_ceiling() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        Mock::given(method("GET"))
            .respond_with(move |_: &wiremock::Request| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429).insert_header("retry-after", "3600")
                } else {
                    ResponseTemplate::new(204)
                }
            })
            .mount(&server)
            .await;

        let http = client(2);
        let started = Instant::now();
        let response = http.send(http.request(Method::GET, server.uri())).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn gone_events_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(410))
            .expect(1)
            .mount(&server)
            .await;

        let http = client(3);
        let response = http.send(http.request(Method::GET, server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_network_error() {
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

        let http = client(2);
        let err = http.send(http.request(Method::GET, format!("http://{addr}"))).await.unwrap_err();
        assert!(matches!(err, MeetSyncError::Network(_)), "got {err:?}");
    }

    #[test]
    fn logged_urls_drop_query_strings() {
        let url = Url::parse("https://calendar.test/v1/events?access_token=secret&from=1").unwrap();
        assert_eq!(loggable(&url), "https://calendar.test/v1/events");
    }
}
