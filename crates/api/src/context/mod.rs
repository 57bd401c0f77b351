//! Application context - dependency injection container

use std::sync::Arc;

use meetsync_core::{
    AuditService, CalendarProvider, Clock, IntegrationRepository, MeetingRepository,
    PollerSettings, ReconciliationPoller, ReconciliationStore, SystemClock, WebhookInbox,
    WebhookProcessor,
};
use meetsync_domain::{Config, Result};
use meetsync_infra::{
    scheduling::PollJob, CalendarApiClient, DbManager, InboxWorker, InboxWorkerConfig, PollScheduler,
    PollSchedulerConfig, SqliteChangeLedger, SqliteIntegrationRepository,
    SqliteMeetingRepository, SqliteReconciliationStore, SqliteWebhookInbox, WebhookVerifier,
};
use tracing::{info, warn};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub clock: Arc<dyn Clock>,

    // Storage ports
    pub meetings: Arc<dyn MeetingRepository>,
    pub integrations: Arc<dyn IntegrationRepository>,
    pub store: Arc<dyn ReconciliationStore>,
    pub inbox: Arc<SqliteWebhookInbox>,

    // Services
    pub provider: Arc<dyn CalendarProvider>,
    pub audit: Arc<AuditService>,
    pub poller: Arc<ReconciliationPoller>,
    pub processor: Arc<WebhookProcessor>,
    pub verifier: Arc<WebhookVerifier>,
}

impl AppContext {
    /// Open the database, run migrations and wire every service.
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;
        let provider: Arc<dyn CalendarProvider> =
            Arc::new(CalendarApiClient::new(&config.provider)?);

        info!(db_path = %db.path().display(), "Application context initialised");
        Ok(Self::with_parts(config, db, provider, Arc::new(SystemClock)))
    }

    /// Wire services around an existing database, provider and clock.
    pub fn with_parts(
        config: Config,
        db: Arc<DbManager>,
        provider: Arc<dyn CalendarProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let meetings = Arc::new(SqliteMeetingRepository::new(Arc::clone(&db)));
        let ledger = Arc::new(SqliteChangeLedger::new(Arc::clone(&db)));
        let integrations = Arc::new(SqliteIntegrationRepository::new(Arc::clone(&db)));
        let store = Arc::new(SqliteReconciliationStore::new(Arc::clone(&db)));
        let inbox = Arc::new(SqliteWebhookInbox::new(Arc::clone(&db)));

        let audit = Arc::new(AuditService::new(meetings.clone(), ledger));
        let poller = Arc::new(ReconciliationPoller::new(
            integrations.clone(),
            meetings.clone(),
            store.clone(),
            Arc::clone(&provider),
            Arc::clone(&clock),
            PollerSettings::from(&config.poller),
        ));
        let processor =
            Arc::new(WebhookProcessor::new(meetings.clone(), store.clone(), Arc::clone(&clock)));
        let verifier = Arc::new(WebhookVerifier::from_config(&config.webhook));

        Self {
            config,
            db,
            clock,
            meetings,
            integrations,
            store,
            inbox,
            provider,
            audit,
            poller,
            processor,
            verifier,
        }
    }
}

/// Long-running jobs owned by the server process.
pub struct BackgroundServices {
    scheduler: Option<PollScheduler>,
    worker: InboxWorker,
}

impl BackgroundServices {
    /// Start the inbox worker and, when enabled, the poll scheduler.
    pub async fn start(ctx: &AppContext) -> anyhow::Result<Self> {
        let inbox: Arc<dyn WebhookInbox> = ctx.inbox.clone();
        let mut worker = InboxWorker::new(
            inbox,
            Arc::clone(&ctx.processor),
            Arc::clone(&ctx.clock),
            InboxWorkerConfig::from(&ctx.config.webhook),
        );
        worker.start().await.map_err(anyhow::Error::msg)?;

        let scheduler = if ctx.config.poller.enabled {
            let mut scheduler = PollScheduler::with_config(
                PollSchedulerConfig::from(&ctx.config.poller),
                Arc::clone(&ctx.poller) as Arc<dyn PollJob>,
            );
            scheduler.start().await?;
            Some(scheduler)
        } else {
            info!("Reconciliation poller disabled");
            None
        };

        Ok(Self { scheduler, worker })
    }

    /// Stop everything, logging but not propagating failures.
    pub async fn shutdown(mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            if let Err(err) = scheduler.stop().await {
                warn!(error = %err, "Failed to stop poll scheduler");
            }
        }
        if let Err(err) = self.worker.stop().await {
            warn!(error = %err, "Failed to stop inbox worker");
        }
    }
}
