//! Audit query endpoints

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use meetsync_core::audit::ChainReport;
use meetsync_domain::{ChangeOrder, ChangePage, MeetSyncError};
use serde::Deserialize;

use super::error::ApiResult;
use super::logged;
use crate::context::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/meetings/{id}/changes", get(list_changes))
        .route("/meetings/{id}/audit/verify", get(verify_chain))
}

/// Query string of `GET /meetings/{id}/changes`
#[derive(Debug, Default, Deserialize)]
pub struct ChangesParams {
    pub order: Option<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

/// GET /meetings/{id}/changes - newest first unless `order=asc`
async fn list_changes(
    State(ctx): State<Arc<AppContext>>,
    Path(meeting_id): Path<String>,
    Query(params): Query<ChangesParams>,
) -> ApiResult<Json<ChangePage>> {
    let started = Instant::now();
    let result = page(&ctx, &meeting_id, &params).await.map(Json);
    logged("audit::list_changes", started, result)
}

async fn page(ctx: &AppContext, meeting_id: &str, params: &ChangesParams) -> ApiResult<ChangePage> {
    let order = match params.order.as_deref() {
        None | Some("") => ChangeOrder::default(),
        Some(raw) => raw.parse::<ChangeOrder>().map_err(MeetSyncError::InvalidInput)?,
    };
    let page =
        ctx.audit.list_changes(meeting_id, order, params.limit, params.cursor.as_deref()).await?;
    Ok(page)
}

/// GET /meetings/{id}/audit/verify
async fn verify_chain(
    State(ctx): State<Arc<AppContext>>,
    Path(meeting_id): Path<String>,
) -> ApiResult<Json<ChainReport>> {
    let started = Instant::now();
    let result = ctx.audit.verify_chain(&meeting_id).await.map(Json).map_err(Into::into);
    logged("audit::verify_chain", started, result)
}
