//! Provider webhook endpoint
//!
//! Verification happens before the body is even parsed. A verified delivery
//! is decoded, written to the durable inbox and acknowledged with `202`;
//! the inbox worker does the reconciliation.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use meetsync_core::WebhookInbox;
use meetsync_domain::constants::{WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER};
use meetsync_infra::integrations::calendar::decode_delivery;
use serde::Serialize;
use tracing::{info, warn};

use super::error::ApiResult;
use super::logged;
use crate::context::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new().route("/webhooks/calendar", post(receive))
}

#[derive(Debug, Serialize)]
pub struct WebhookAccepted {
    pub status: &'static str,
    pub entry_id: String,
    pub event_id: String,
}

/// POST /webhooks/calendar
async fn receive(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<WebhookAccepted>)> {
    let started = Instant::now();
    let result = accept(&ctx, &headers, &body).await;
    logged("webhooks::receive", started, result)
}

async fn accept(
    ctx: &AppContext,
    headers: &HeaderMap,
    body: &[u8],
) -> ApiResult<(StatusCode, Json<WebhookAccepted>)> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    let now = ctx.clock.now();
    if let Err(rejection) =
        ctx.verifier.verify(header(WEBHOOK_SIGNATURE_HEADER), header(WEBHOOK_TIMESTAMP_HEADER), body, now)
    {
        warn!(reason = %rejection, "Rejected webhook delivery");
        return Err(rejection.into());
    }

    let (delivery, raw_payload) = decode_delivery(body)?;
    let entry = ctx.inbox.enqueue(&delivery, &raw_payload, now).await?;
    info!(entry_id = %entry.id, event_id = %entry.event_id, kind = %delivery.kind, "Webhook delivery accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAccepted { status: "accepted", entry_id: entry.id, event_id: entry.event_id }),
    ))
}
