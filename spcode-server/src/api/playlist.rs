//! Playlist pipeline endpoint
//!
//! POST /playlist

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    models::{PlaylistInfo, MAX_TRACKS_PER_REQUEST},
    AppState,
};

/// POST /playlist request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRequest {
    pub playlist_uri: String,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

/// POST /playlist response
#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    pub status: &'static str,
    pub data: PlaylistInfo,
}

/// POST /playlist
///
/// Generates models for `[start, end)` of the playlist (defaults 0 and 3) and
/// returns the playlist name with the sliced track list. Models are fetched
/// separately from `/stl/<id>.stl`.
pub async fn generate_playlist(
    State(state): State<AppState>,
    payload: Result<Json<PlaylistRequest>, JsonRejection>,
) -> ApiResult<Json<PlaylistResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let start = request.start.unwrap_or(0);
    let end = request.end.unwrap_or(MAX_TRACKS_PER_REQUEST);
    tracing::debug!(playlist = %request.playlist_uri, start, end, "New playlist request");

    let data = state
        .pipeline
        .process_request(&request.playlist_uri, start, end)
        .await?;

    Ok(Json(PlaylistResponse { status: "ok", data }))
}

/// Build playlist routes
pub fn playlist_routes() -> Router<AppState> {
    Router::new().route("/playlist", post(generate_playlist).fallback(super::not_found))
}
