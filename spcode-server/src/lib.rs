//! spcode-server library interface
//!
//! Exposes the pipeline services and the HTTP router so the binary and the
//! integration tests wire them the same way.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, PipelineError};

use axum::Router;
use chrono::{DateTime, Utc};
use spcode_common::config::TomlConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::services::upstream::{build_http_client, PlaylistClient, ScannableClient, TokenClient};
use crate::services::{
    ArtifactStore, CodeImageSource, CodeImageStage, ModelConverter, ModelStage, OpenScadConverter,
    Pipeline, PlaylistResolver, PlaylistSource, TokenManager, TokenSource,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            startup_time: Utc::now(),
        }
    }
}

/// External collaborators of the pipeline
pub struct PipelineDeps {
    pub tokens: Arc<dyn TokenSource>,
    pub playlists: Arc<dyn PlaylistSource>,
    pub images: Arc<dyn CodeImageSource>,
    pub converter: Arc<dyn ModelConverter>,
}

impl PipelineDeps {
    /// Real upstream clients and the OpenSCAD converter
    pub fn from_config(
        config: &TomlConfig,
        openscad_binary: PathBuf,
    ) -> Result<Self, PipelineError> {
        let http_client = build_http_client(Duration::from_secs(config.upstream.timeout_secs))?;

        Ok(Self {
            tokens: Arc::new(TokenClient::new(
                http_client.clone(),
                config.upstream.token_url.clone(),
            )),
            playlists: Arc::new(PlaylistClient::new(
                http_client.clone(),
                config.upstream.playlist_url.clone(),
            )),
            images: Arc::new(ScannableClient::new(
                http_client,
                config.upstream.scannable_url.clone(),
            )),
            converter: Arc::new(OpenScadConverter::new(
                openscad_binary,
                config.openscad.scad_file.clone(),
                Duration::from_secs(config.openscad.timeout_secs),
            )),
        })
    }
}

/// Wire the stages together; spawns the queue workers on the current runtime
pub fn build_pipeline(store: ArtifactStore, deps: PipelineDeps, cache_ttl: Duration) -> Pipeline {
    let tokens = TokenManager::new(deps.tokens);
    let resolver = PlaylistResolver::new(tokens, deps.playlists, cache_ttl);
    let images = CodeImageStage::new(store.clone(), deps.images);
    let models = ModelStage::new(store.clone(), deps.converter);

    Pipeline::new(resolver, images, models, store)
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::playlist_routes())
        .merge(api::model_routes())
        .merge(api::health_routes())
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
