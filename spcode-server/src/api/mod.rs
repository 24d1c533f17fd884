//! HTTP API handlers for spcode-server
//!
//! `POST /playlist`, `GET /stl/:file`, `GET /health`; everything else is 404.

pub mod health;
pub mod models;
pub mod playlist;

pub use health::health_routes;
pub use models::model_routes;
pub use playlist::playlist_routes;

use crate::error::ApiError;

/// Fallback for unknown routes and methods
pub async fn not_found() -> ApiError {
    ApiError::NotFound("no such route".to_string())
}
