//! Webhook inbox worker.
//!
//! Polls the durable inbox for due entries, hands each to the
//! [`WebhookProcessor`] and records the result. Failed entries are retried
//! with exponential backoff until `max_attempts`, then parked as dead
//! letters; the reconciliation poller stays the backstop for anything
//! parked. Join handles are tracked, cancellation is explicit and each batch
//! runs under a timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use meetsync_common::{Backoff, Jitter};
use meetsync_core::{Clock, WebhookDisposition, WebhookInbox, WebhookProcessor};
use meetsync_domain::{InboxEntry, MeetSyncError, WebhookConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the inbox worker.
#[derive(Debug, Clone)]
pub struct InboxWorkerConfig {
    /// Maximum number of entries claimed per batch
    pub batch_size: usize,
    /// Interval between polling attempts
    pub poll_interval: Duration,
    /// Timeout for processing a single batch
    pub processing_timeout: Duration,
    /// Attempts before an entry is dead-lettered
    pub max_attempts: u32,
    /// How long a claim is held before another worker may take it
    pub lease: ChronoDuration,
    /// Delay between attempts of one entry
    pub backoff: Backoff,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for InboxWorkerConfig {
    fn default() -> Self {
        Self::from(&WebhookConfig::default())
    }
}

impl From<&WebhookConfig> for InboxWorkerConfig {
    fn from(config: &WebhookConfig) -> Self {
        let lease = ChronoDuration::seconds(config.lease_secs.max(1));
        Self {
            batch_size: config.batch_size.max(1),
            poll_interval: Duration::from_millis(config.worker_interval_ms.max(10)),
            processing_timeout: lease.to_std().unwrap_or(Duration::from_secs(60)),
            max_attempts: config.max_attempts.max(1),
            lease,
            backoff: Backoff::exponential(
                Duration::from_millis(config.retry_initial_ms),
                Duration::from_millis(config.retry_max_ms),
            )
            .with_jitter(Jitter::Equal),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub claimed: usize,
    pub done: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

/// Inbox worker with explicit lifecycle management.
pub struct InboxWorker {
    inbox: Arc<dyn WebhookInbox>,
    processor: Arc<WebhookProcessor>,
    clock: Arc<dyn Clock>,
    config: InboxWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl InboxWorker {
    pub fn new(
        inbox: Arc<dyn WebhookInbox>,
        processor: Arc<WebhookProcessor>,
        clock: Arc<dyn Clock>,
        config: InboxWorkerConfig,
    ) -> Self {
        Self {
            inbox,
            processor,
            clock,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the worker, spawning the background processing task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_running() {
            return Err("Worker already running".to_string());
        }

        info!("Starting inbox worker");
        self.cancellation = CancellationToken::new();

        let inbox = Arc::clone(&self.inbox);
        let processor = Arc::clone(&self.processor);
        let clock = Arc::clone(&self.clock);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::process_loop(inbox, processor, clock, config, cancel).await;
        }));

        info!("Inbox worker started");
        Ok(())
    }

    /// Stop the worker and wait for the processing task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running() {
            return Err("Worker not running".to_string());
        }

        info!("Stopping inbox worker");
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Worker task panicked: {}", e);
                    return Err("Worker task panicked".to_string());
                }
                Err(_) => {
                    warn!("Worker task did not complete within timeout");
                    return Err("Worker task timeout".to_string());
                }
            }
        }

        info!("Inbox worker stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a worker instance is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn process_loop(
        inbox: Arc<dyn WebhookInbox>,
        processor: Arc<WebhookProcessor>,
        clock: Arc<dyn Clock>,
        config: InboxWorkerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Inbox worker process loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(config.poll_interval) => {
                    let started = Instant::now();
                    match tokio::time::timeout(
                        config.processing_timeout,
                        Self::process_batch(&inbox, &processor, &clock, &config),
                    )
                    .await
                    {
                        Ok(Ok(stats)) if stats.claimed > 0 => {
                            debug!(
                                ?stats,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "Inbox batch processed"
                            );
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(error = %e, "Inbox batch failed"),
                        Err(_) => warn!(
                            timeout_secs = config.processing_timeout.as_secs(),
                            "Inbox batch timed out; unfinished entries will be re-claimed"
                        ),
                    }
                }
            }
        }
    }

    /// Claim and process one batch of due entries.
    pub async fn process_batch(
        inbox: &Arc<dyn WebhookInbox>,
        processor: &WebhookProcessor,
        clock: &Arc<dyn Clock>,
        config: &InboxWorkerConfig,
    ) -> Result<BatchStats, String> {
        let entries = inbox
            .claim_due(clock.now(), config.batch_size, config.lease)
            .await
            .map_err(|e| format!("Failed to claim inbox batch: {e}"))?;

        let mut stats = BatchStats { claimed: entries.len(), ..BatchStats::default() };
        let mut fatal_errors: Vec<String> = Vec::new();

        for entry in entries {
            let result = match processor.process(&entry).await {
                Ok(disposition) => {
                    log_disposition(&entry, &disposition);
                    stats.done += 1;
                    inbox.mark_done(&entry.id).await
                }
                Err(err) if should_dead_letter(&entry, &err, config.max_attempts) => {
                    warn!(entry_id = %entry.id, attempts = entry.attempts, error = %err, "Dead-lettering webhook delivery");
                    stats.dead_lettered += 1;
                    inbox.dead_letter(&entry.id, &truncate_reason(&err.to_string())).await
                }
                Err(err) => {
                    let delay = config.backoff.delay_for(entry.attempts);
                    let next_attempt_at =
                        clock.now() + ChronoDuration::from_std(delay).unwrap_or(config.lease);
                    debug!(entry_id = %entry.id, attempts = entry.attempts, error = %err, "Retrying webhook delivery later");
                    stats.retried += 1;
                    inbox.mark_retry(&entry.id, &truncate_reason(&err.to_string()), next_attempt_at).await
                }
            };

            if let Err(err) = result {
                warn!(entry_id = %entry.id, error = %err, "Failed to record inbox result");
                fatal_errors.push(format!("{}: {}", entry.id, err));
            }
        }

        if !fatal_errors.is_empty() {
            return Err(fatal_errors.join("; "));
        }
        Ok(stats)
    }
}

fn should_dead_letter(entry: &InboxEntry, err: &MeetSyncError, max_attempts: u32) -> bool {
    entry.attempts >= max_attempts || !err.is_transient()
}

fn log_disposition(entry: &InboxEntry, disposition: &WebhookDisposition) {
    match disposition {
        WebhookDisposition::Unmatched => {
            info!(entry_id = %entry.id, event_id = %entry.event_id, "No linked meeting; delivery dropped");
        }
        WebhookDisposition::Applied(outcome) => {
            debug!(entry_id = %entry.id, outcome = outcome.label(), "Webhook delivery processed");
        }
    }
}

fn truncate_reason(reason: &str) -> String {
    const MAX_LEN: usize = 256;
    if reason.len() <= MAX_LEN {
        return reason.to_string();
    }

    let mut truncated = reason.chars().take(MAX_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}

impl Drop for InboxWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("InboxWorker dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
