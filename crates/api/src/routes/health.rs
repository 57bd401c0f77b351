//! GET /health

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use meetsync_domain::InboxStatus;
use tokio::task;

use crate::context::AppContext;
use crate::utils::health::{ComponentHealth, HealthStatus};

pub fn router() -> Router<Arc<AppContext>> {
    Router::new().route("/health", get(health))
}

async fn health(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<HealthStatus>) {
    let db = Arc::clone(&ctx.db);
    let database = match task::spawn_blocking(move || db.health_check()).await {
        Ok(Ok(())) => {
            let pool = ctx.db.pool().stats();
            ComponentHealth::healthy("database").with_message(format!(
                "{}/{} connections in use, {} acquisition timeouts",
                pool.in_use(),
                pool.max_size,
                pool.timeouts
            ))
        }
        Ok(Err(err)) => ComponentHealth::unhealthy("database", err.to_string()),
        Err(err) => ComponentHealth::unhealthy("database", err.to_string()),
    };

    let inbox = match (
        ctx.inbox.count_by_status(InboxStatus::Pending).await,
        ctx.inbox.count_by_status(InboxStatus::DeadLetter).await,
    ) {
        (Ok(pending), Ok(dead)) => ComponentHealth::healthy("webhook_inbox")
            .with_message(format!("{pending} pending, {dead} dead-lettered")),
        (Err(err), _) | (_, Err(err)) => ComponentHealth::unhealthy("webhook_inbox", err.to_string()),
    };

    let status = HealthStatus::from_components(vec![database, inbox]);
    let code = if status.is_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(status))
}
