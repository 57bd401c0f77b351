//! HTTP routes
//!
//! Every router shares `Arc<AppContext>` as state. Handlers return
//! [`error::ApiResult`] so failures map to a status code and a JSON body.

pub mod admin;
pub mod audit;
pub mod error;
pub mod health;
pub mod integrations;
pub mod meetings;
pub mod webhooks;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use meetsync_domain::MeetSyncError;

use crate::context::AppContext;
use crate::utils::logging::log_request_outcome;
use error::{ApiError, ApiResult};

/// Build the application router.
pub fn app(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .merge(webhooks::router())
        .merge(audit::router())
        .merge(meetings::router())
        .merge(integrations::router())
        .merge(admin::router())
        .merge(health::router())
        .with_state(ctx)
}

/// Log a handler's outcome under a stable route label.
fn logged<T>(route: &'static str, started: Instant, result: ApiResult<T>) -> ApiResult<T> {
    let error = match &result {
        Ok(_) => None,
        Err(ApiError::Domain(err)) => Some(err.clone()),
        Err(ApiError::Rejected(rejection)) => Some(MeetSyncError::from(rejection.clone())),
    };
    log_request_outcome(route, started.elapsed(), error.as_ref());
    result
}
