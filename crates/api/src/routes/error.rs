//! Error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meetsync_domain::MeetSyncError;
use meetsync_infra::integrations::calendar::WebhookRejection;
use serde::Serialize;
use tracing::error;

use crate::utils::logging::error_label;

/// JSON body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

/// Handler error converted into a status code and [`ErrorResponse`].
#[derive(Debug)]
pub enum ApiError {
    Domain(MeetSyncError),
    Rejected(WebhookRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Rejected(_) => StatusCode::UNAUTHORIZED,
            Self::Domain(err) => match err {
                MeetSyncError::NotFound(_) => StatusCode::NOT_FOUND,
                MeetSyncError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                MeetSyncError::Conflict(_) => StatusCode::CONFLICT,
                MeetSyncError::Security(_) => StatusCode::UNAUTHORIZED,
                MeetSyncError::Auth(_) | MeetSyncError::Network(_) => StatusCode::BAD_GATEWAY,
                MeetSyncError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
                MeetSyncError::Config(_) | MeetSyncError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            Self::Rejected(rejection) => {
                ErrorResponse { error: "unauthorized", message: rejection.to_string() }
            }
            Self::Domain(err) => {
                let message = match err {
                    MeetSyncError::NotFound(detail)
                    | MeetSyncError::InvalidInput(detail)
                    | MeetSyncError::Conflict(detail) => detail.clone(),
                    MeetSyncError::Auth(_) | MeetSyncError::Network(_) => {
                        "calendar provider request failed".to_string()
                    }
                    MeetSyncError::Security(_) => "request rejected".to_string(),
                    MeetSyncError::Database(_) => "storage temporarily unavailable".to_string(),
                    MeetSyncError::Config(_) | MeetSyncError::Internal(_) => {
                        "internal error".to_string()
                    }
                };
                ErrorResponse { error: error_label(err), message }
            }
        }
    }
}

impl From<MeetSyncError> for ApiError {
    fn from(err: MeetSyncError) -> Self {
        Self::Domain(err)
    }
}

impl From<WebhookRejection> for ApiError {
    fn from(rejection: WebhookRejection) -> Self {
        Self::Rejected(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if let Self::Domain(err) = &self {
                error!(error = %err, status = status.as_u16(), "Request failed");
            }
        }
        (status, Json(self.body())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
