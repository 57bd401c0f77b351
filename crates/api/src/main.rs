//! MeetSync server entry point.

use std::sync::Arc;

use anyhow::Context;
use meetsync_api::utils::logging::init_tracing;
use meetsync_api::{router, AppContext, BackgroundServices};
use meetsync_infra::config;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the config reads the environment.
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    init_tracing(config.server.json_logs);
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(err) => warn!(error = %err, "No .env loaded"),
    }

    let bind_addr = config.server.bind_addr.clone();
    let ctx = Arc::new(AppContext::new(config).context("failed to initialise application")?);
    let background = BackgroundServices::start(&ctx).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "MeetSync listening");

    let served = axum::serve(listener, router(Arc::clone(&ctx)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    background.shutdown().await;
    info!("MeetSync stopped");
    served.context("server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
