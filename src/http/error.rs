//! HTTP error mapping
//!
//! Converts [`ChartError`] values into JSON error responses with the
//! appropriate status codes. Only a small slice of the taxonomy ever
//! reaches a caller: fetch failures are absorbed by the cache fallback and
//! surface solely as `UpstreamUnavailable`, and malformed query parameters
//! never error at all.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::types::ChartError;

/// Error body returned to API callers
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Wrapper carrying a ChartError into an axum response
#[derive(Debug)]
pub struct ApiError(pub ChartError);

impl ApiError {
    /// The HTTP status for the wrapped error
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            ChartError::UpstreamUnavailable { .. }
            | ChartError::UpstreamTimeout { .. }
            | ChartError::MalformedUpstreamData { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ChartError::CacheReadFailed { .. }
            | ChartError::CacheWriteFailed { .. }
            | ChartError::InvalidConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ChartError> for ApiError {
    fn from(error: ChartError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(status = %status, error = %self.0, "request failed");
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
