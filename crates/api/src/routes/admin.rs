//! Operator endpoints

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use meetsync_domain::MeetSyncError;
use serde::Serialize;

use super::error::ApiResult;
use super::logged;
use crate::context::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new().route("/admin/webhooks/register", post(register_webhook))
}

#[derive(Debug, Serialize)]
pub struct Registered {
    pub url: String,
}

/// POST /admin/webhooks/register - point the provider at `webhook.public_url`
async fn register_webhook(State(ctx): State<Arc<AppContext>>) -> ApiResult<Json<Registered>> {
    let started = Instant::now();
    let result = register(&ctx).await.map(Json);
    logged("admin::register_webhook", started, result)
}

async fn register(ctx: &AppContext) -> ApiResult<Registered> {
    let url = ctx.config.webhook.public_url.clone().ok_or_else(|| {
        MeetSyncError::InvalidInput("webhook.public_url is not configured".into())
    })?;
    ctx.provider.register_webhook(&url).await?;
    Ok(Registered { url })
}
