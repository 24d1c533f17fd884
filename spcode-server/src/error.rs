//! Error types for spcode-server
//!
//! `PipelineError` is the taxonomy shared by every pipeline stage. `ApiError`
//! is what HTTP handlers return; it maps each kind to a status code and a
//! short fixed message so upstream detail never reaches the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of a pipeline operation
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Requested track range rejected before any work
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Playlist identifier could not be normalized
    #[error("Invalid playlist identifier: {0}")]
    InvalidPlaylist(String),

    /// Upstream rejected the bearer credential; a refresh has been started
    #[error("Upstream credential expired")]
    AuthExpired,

    /// Playlist payload carried no track list
    #[error("No tracks found for playlist {0}")]
    NoTracksFound(String),

    /// Scannable image did not end with the SVG closing tag
    #[error("Malformed code image for track {0}")]
    MalformedImage(String),

    /// Requested artifact does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// CAD tool failed or produced no model
    #[error("Model conversion failed: {0}")]
    ConversionFailed(String),

    /// Upstream call or subprocess exceeded its time bound
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Network failure or unexpected upstream response
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker of a serialization queue is gone
    #[error("Work queue '{0}' is closed")]
    QueueClosed(&'static str),
}

/// Map a reqwest failure, keeping timeouts distinguishable
pub(crate) fn upstream_error(context: &str, err: reqwest::Error) -> PipelineError {
    if err.is_timeout() {
        PipelineError::Timeout(context.to_string())
    } else {
        PipelineError::Upstream(format!("{}: {}", context, err))
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not found"),
            ApiError::Pipeline(err) => match err {
                PipelineError::InvalidRange(_) => {
                    (StatusCode::BAD_REQUEST, "requested range is not allowed")
                }
                PipelineError::InvalidPlaylist(_) => {
                    (StatusCode::BAD_REQUEST, "invalid playlist identifier")
                }
                PipelineError::AuthExpired => (
                    StatusCode::UNAUTHORIZED,
                    "upstream credential expired, retry the request",
                ),
                PipelineError::NoTracksFound(_) => (StatusCode::BAD_REQUEST, "no tracks found"),
                PipelineError::MalformedImage(_) => {
                    (StatusCode::BAD_REQUEST, "scannable code unavailable")
                }
                PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "not found"),
                PipelineError::ConversionFailed(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "model generation failed")
                }
                PipelineError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "upstream timed out"),
                PipelineError::Upstream(_) => (StatusCode::FAILED_DEPENDENCY, "upstream error"),
                PipelineError::Io(_) | PipelineError::QueueClosed(_) => {
                    (StatusCode::BAD_REQUEST, "unexpected error")
                }
            },
        }
    }

    /// Faults on this side or upstream, as opposed to a rejected request
    fn is_service_fault(&self) -> bool {
        matches!(
            self,
            ApiError::Pipeline(
                PipelineError::ConversionFailed(_)
                    | PipelineError::Timeout(_)
                    | PipelineError::Upstream(_)
                    | PipelineError::Io(_)
                    | PipelineError::QueueClosed(_)
            )
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if self.is_service_fault() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
