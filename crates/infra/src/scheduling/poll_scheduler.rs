//! Cron trigger for the reconciliation poller.
//!
//! Each tick runs one poll cycle under a timeout. A tick that fires while the
//! previous cycle is still running is skipped, so cycles never overlap.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use meetsync_infra::scheduling::{PollJob, PollScheduler, PollSchedulerConfig, SchedulerResult};
//!
//! # async fn example(poller: Arc<dyn PollJob>) -> SchedulerResult<()> {
//! let mut scheduler = PollScheduler::with_config(
//!     PollSchedulerConfig { cron_expression: "0 */5 * * * *".into(), ..Default::default() },
//!     poller,
//! );
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use meetsync_core::{CycleReport, ReconciliationPoller};
use meetsync_domain::constants::DEFAULT_POLL_CRON;
use meetsync_domain::{PollerConfig, Result as DomainResult};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// One poll cycle.
#[async_trait]
pub trait PollJob: Send + Sync {
    async fn run(&self) -> DomainResult<CycleReport>;
}

#[async_trait]
impl PollJob for ReconciliationPoller {
    async fn run(&self) -> DomainResult<CycleReport> {
        self.run_cycle().await
    }
}

/// Configuration for the poll scheduler.
#[derive(Debug, Clone)]
pub struct PollSchedulerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Timeout applied to a single cycle.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for PollSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: DEFAULT_POLL_CRON.into(),
            job_timeout: Duration::from_secs(240),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&PollerConfig> for PollSchedulerConfig {
    fn from(config: &PollerConfig) -> Self {
        Self { cron_expression: config.cron.clone(), ..Self::default() }
    }
}

/// Poll scheduler with explicit lifecycle management.
pub struct PollScheduler {
    scheduler: Option<JobScheduler>,
    config: PollSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    job: Arc<dyn PollJob>,
    in_flight: Arc<Mutex<()>>,
}

impl PollScheduler {
    /// Create a scheduler with the default configuration and `cron_expression`.
    pub fn new(cron_expression: String, job: Arc<dyn PollJob>) -> Self {
        Self::with_config(PollSchedulerConfig { cron_expression, ..Default::default() }, job)
    }

    /// Create a scheduler with a custom configuration.
    pub fn with_config(config: PollSchedulerConfig, job: Arc<dyn PollJob>) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            job,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self), fields(cron = %self.config.cron_expression))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("Poll scheduler monitor cancelled");
        }));

        info!("Poll scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
            .await
            .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("Poll scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Run one cycle immediately, outside the cron schedule.
    ///
    /// Returns `None` when a cycle is already in flight or timed out.
    pub async fn run_now(&self) -> Option<CycleReport> {
        Self::run_guarded(&self.job, &self.in_flight, self.config.job_timeout).await
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;
        let job = Arc::clone(&self.job);
        let in_flight = Arc::clone(&self.in_flight);
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
            let job = Arc::clone(&job);
            let in_flight = Arc::clone(&in_flight);
            Box::pin(async move {
                Self::run_guarded(&job, &in_flight, job_timeout).await;
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered poll job");
        Ok(scheduler)
    }

    async fn run_guarded(
        job: &Arc<dyn PollJob>,
        in_flight: &Mutex<()>,
        job_timeout: Duration,
    ) -> Option<CycleReport> {
        let Ok(_guard) = in_flight.try_lock() else {
            warn!("Previous poll cycle still running; skipping tick");
            return None;
        };
        let started = Instant::now();

        match tokio::time::timeout(job_timeout, job.run()).await {
            Ok(Ok(report)) => {
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    integrations = report.integrations.len(),
                    "Poll cycle finished"
                );
                Some(report)
            }
            Ok(Err(err)) => {
                error!(error = %err, "Poll cycle failed");
                None
            }
            Err(_) => {
                warn!(timeout_secs = job_timeout.as_secs(), "Poll cycle timed out");
                None
            }
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("PollScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
