//! Meeting creation and local edits

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use meetsync_domain::{LocalEdit, Meeting, MeetSyncError, MeetingChange, NewMeeting};
use serde::Serialize;

use super::error::ApiResult;
use super::logged;
use crate::context::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/meetings", post(create_meeting))
        .route("/meetings/{id}", get(get_meeting).patch(edit_meeting))
}

/// Response of `PATCH /meetings/{id}`
#[derive(Debug, Serialize)]
pub struct EditResponse {
    pub meeting: Meeting,
    /// `None` when the edit matched the current values.
    pub change: Option<MeetingChange>,
}

async fn create_meeting(
    State(ctx): State<Arc<AppContext>>,
    Json(new): Json<NewMeeting>,
) -> ApiResult<(StatusCode, Json<Meeting>)> {
    let started = Instant::now();
    let result = ctx
        .meetings
        .create_meeting(&new)
        .await
        .map(|meeting| (StatusCode::CREATED, Json(meeting)))
        .map_err(Into::into);
    logged("meetings::create", started, result)
}

async fn get_meeting(
    State(ctx): State<Arc<AppContext>>,
    Path(meeting_id): Path<String>,
) -> ApiResult<Json<Meeting>> {
    let started = Instant::now();
    let result = load(&ctx, &meeting_id).await.map(Json);
    logged("meetings::get", started, result)
}

/// PATCH /meetings/{id} - user edit, recorded as an `updated` ledger row
async fn edit_meeting(
    State(ctx): State<Arc<AppContext>>,
    Path(meeting_id): Path<String>,
    Json(edit): Json<LocalEdit>,
) -> ApiResult<Json<EditResponse>> {
    let started = Instant::now();
    let result = apply_edit(&ctx, &meeting_id, &edit).await.map(Json);
    logged("meetings::edit", started, result)
}

async fn apply_edit(ctx: &AppContext, meeting_id: &str, edit: &LocalEdit) -> ApiResult<EditResponse> {
    if edit.is_empty() {
        return Err(MeetSyncError::InvalidInput("edit names no fields".into()).into());
    }
    let change = ctx.store.record_local_edit(meeting_id, edit, ctx.clock.now()).await?;
    let meeting = load(ctx, meeting_id).await?;
    Ok(EditResponse { meeting, change })
}

async fn load(ctx: &AppContext, meeting_id: &str) -> ApiResult<Meeting> {
    ctx.meetings
        .get_meeting(meeting_id)
        .await?
        .ok_or_else(|| MeetSyncError::NotFound(format!("meeting {meeting_id}")).into())
}
