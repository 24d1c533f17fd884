//! Model download endpoint
//!
//! GET /stl/:file

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;

use crate::{
    error::{ApiError, ApiResult, PipelineError},
    models::is_valid_external_id,
    AppState,
};

const MODEL_CONTENT_TYPE: &str = "model/stl";
const MODEL_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Track id from a `<id>.stl` file name
pub fn model_id_from_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(".stl")
        .filter(|id| is_valid_external_id(id))
}

/// GET /stl/:file
///
/// Streams a previously generated model as an attachment.
pub async fn download_model(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> ApiResult<Response> {
    let external_id = model_id_from_file_name(&file_name)
        .ok_or_else(|| ApiError::BadRequest(format!("malformed model name: {}", file_name)))?;

    let path = state.pipeline.model_path(external_id).await?;
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::NotFound(file_name.clone())
        } else {
            PipelineError::Io(e)
        }
    })?;
    let length = file.metadata().await.map_err(PipelineError::Io)?.len();

    tracing::debug!(track = %external_id, bytes = length, "Serving model");

    let headers = [
        (header::CONTENT_TYPE, MODEL_CONTENT_TYPE.to_string()),
        (header::CONTENT_LENGTH, length.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.stl\"", external_id),
        ),
        (header::CACHE_CONTROL, MODEL_CACHE_CONTROL.to_string()),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// Build model download routes
pub fn model_routes() -> Router<AppState> {
    Router::new().route("/stl/:file", get(download_model).fallback(super::not_found))
}
