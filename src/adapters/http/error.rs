//! Maps domain errors onto HTTP status codes and a JSON error body.

use crate::domain::error::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let (status, limit) = match &self {
            CoreError::Validation(_) => (StatusCode::BAD_REQUEST, None),
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            CoreError::QuotaExceeded { limit } => (StatusCode::TOO_MANY_REQUESTS, Some(*limit)),
            CoreError::Collaborator(_) => (StatusCode::BAD_GATEWAY, None),
            CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };
        if status.is_server_error() {
            error!(%status, "request failed: {}", self);
        } else {
            warn!(%status, "request rejected: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            limit,
        };
        (status, Json(body)).into_response()
    }
}
