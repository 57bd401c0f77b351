//! Integration status and lifecycle

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use meetsync_domain::{IntegrationStatusView, MeetSyncError, NewIntegration};
use tracing::info;

use super::error::ApiResult;
use super::logged;
use crate::context::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/integrations", post(connect))
        .route("/integrations/{id}/status", get(status))
        .route("/integrations/{id}/disconnect", post(disconnect))
}

async fn connect(
    State(ctx): State<Arc<AppContext>>,
    Json(new): Json<NewIntegration>,
) -> ApiResult<(StatusCode, Json<IntegrationStatusView>)> {
    let started = Instant::now();
    let result = ctx
        .integrations
        .create_integration(&new)
        .await
        .map(|integration| (StatusCode::CREATED, Json(IntegrationStatusView::from(&integration))))
        .map_err(Into::into);
    logged("integrations::connect", started, result)
}

/// GET /integrations/{id}/status - user-facing message, never provider text
async fn status(
    State(ctx): State<Arc<AppContext>>,
    Path(integration_id): Path<String>,
) -> ApiResult<Json<IntegrationStatusView>> {
    let started = Instant::now();
    let result = view(&ctx, &integration_id).await.map(Json);
    logged("integrations::status", started, result)
}

/// POST /integrations/{id}/disconnect - in-flight poll cycles abandon it
async fn disconnect(
    State(ctx): State<Arc<AppContext>>,
    Path(integration_id): Path<String>,
) -> ApiResult<Json<IntegrationStatusView>> {
    let started = Instant::now();
    let result = deactivate(&ctx, &integration_id).await.map(Json);
    logged("integrations::disconnect", started, result)
}

async fn deactivate(ctx: &AppContext, integration_id: &str) -> ApiResult<IntegrationStatusView> {
    if ctx.integrations.deactivate(integration_id).await? {
        info!(integration_id, "Integration disconnected");
    }
    view(ctx, integration_id).await
}

async fn view(ctx: &AppContext, integration_id: &str) -> ApiResult<IntegrationStatusView> {
    let integration = ctx
        .integrations
        .get_integration(integration_id)
        .await?
        .ok_or_else(|| MeetSyncError::NotFound(format!("integration {integration_id}")))?;
    Ok(IntegrationStatusView::from(&integration))
}
