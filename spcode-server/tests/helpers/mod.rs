//! Shared fixtures for spcode-server integration tests
//!
//! In-process fakes for the upstream services and the CAD tool, each counting
//! its calls, plus a pipeline wired to them over a temporary data folder.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use spcode_common::config::DataFolderInitializer;
use spcode_server::models::{AccessToken, PlaylistId};
use spcode_server::services::upstream::{
    CodeImageSource, PlaylistPayload, PlaylistSource, TokenError, TokenSource,
};
use spcode_server::services::{ArtifactStore, ModelConverter, Pipeline};
use spcode_server::{build_pipeline, PipelineDeps, PipelineError};

/// Raw document as served upstream; the second line is the artifact to drop
pub const RAW_SVG: &str = "<?xml version=\"1.0\"?>\n<!-- artifact -->\n<svg width=\"640\">\n<rect/>\n</svg>";
pub const PROCESSED_SVG: &str = "<?xml version=\"1.0\"?>\n<svg width=\"640\">\n<rect/>\n</svg>";
pub const MODEL_BYTES: &[u8] = b"solid code\nendsolid code\n";

#[derive(Default)]
pub struct FakeTokenSource {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TokenSource for FakeTokenSource {
    async fn fetch_token(&self) -> Result<AccessToken, TokenError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(format!("token-{}", n)))
    }
}

pub struct FakePlaylistSource {
    pub calls: AtomicUsize,
    pub reject_token: AtomicBool,
    pub tokens_seen: Mutex<Vec<String>>,
    payload: PlaylistPayload,
}

impl FakePlaylistSource {
    pub fn new(payload: PlaylistPayload) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reject_token: AtomicBool::new(false),
            tokens_seen: Mutex::new(Vec::new()),
            payload,
        }
    }
}

#[async_trait]
impl PlaylistSource for FakePlaylistSource {
    async fn fetch_playlist(
        &self,
        _playlist: &PlaylistId,
        token: &AccessToken,
    ) -> Result<PlaylistPayload, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen
            .lock()
            .unwrap()
            .push(token.as_str().to_string());

        if self.reject_token.load(Ordering::SeqCst) {
            return Err(PipelineError::AuthExpired);
        }
        Ok(self.payload.clone())
    }
}

pub struct FakeImageSource {
    pub calls: AtomicUsize,
    body: String,
}

impl FakeImageSource {
    pub fn new(body: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl CodeImageSource for FakeImageSource {
    async fn fetch_svg(&self, _external_id: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

#[derive(Default)]
pub struct FakeConverter {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl ModelConverter for FakeConverter {
    async fn convert(&self, svg: &Path, output: &Path) -> Result<(), PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::ConversionFailed("exit status 1".to_string()));
        }
        assert!(svg.exists(), "converter ran before the code image existed");
        tokio::fs::write(output, MODEL_BYTES).await?;
        Ok(())
    }
}

/// Playlist payload with `count` tracks `t0..`, each by two artists
pub fn playlist_payload(name: &str, count: usize) -> PlaylistPayload {
    let items: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "track": {
                    "name": format!("Title{}", i),
                    "uri": format!("spotify:track:t{}", i),
                    "artists": [{ "name": "A1" }, { "name": "A2" }]
                }
            })
        })
        .collect();

    serde_json::from_value(serde_json::json!({
        "name": name,
        "tracks": { "items": items }
    }))
    .unwrap()
}

pub struct TestPipeline {
    pub pipeline: Pipeline,
    pub store: ArtifactStore,
    pub tokens: Arc<FakeTokenSource>,
    pub playlists: Arc<FakePlaylistSource>,
    pub images: Arc<FakeImageSource>,
    pub converter: Arc<FakeConverter>,
    pub temp_dir: TempDir,
}

impl TestPipeline {
    pub fn new(payload: PlaylistPayload) -> Self {
        Self::with_image(payload, RAW_SVG)
    }

    pub fn with_image(payload: PlaylistPayload, svg: &str) -> Self {
        Self::build(payload, svg, Duration::from_secs(60))
    }

    /// Pipeline whose playlist cache expires after `ttl`
    pub fn with_ttl(payload: PlaylistPayload, ttl: Duration) -> Self {
        Self::build(payload, RAW_SVG, ttl)
    }

    fn build(payload: PlaylistPayload, svg: &str, ttl: Duration) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let folder = DataFolderInitializer::new(temp_dir.path().to_path_buf());
        folder.ensure_layout().unwrap();
        let store = ArtifactStore::new(&folder);

        let tokens = Arc::new(FakeTokenSource::default());
        let playlists = Arc::new(FakePlaylistSource::new(payload));
        let images = Arc::new(FakeImageSource::new(svg));
        let converter = Arc::new(FakeConverter::default());

        let deps = PipelineDeps {
            tokens: tokens.clone(),
            playlists: playlists.clone(),
            images: images.clone(),
            converter: converter.clone(),
        };
        let pipeline = build_pipeline(store.clone(), deps, ttl);

        Self {
            pipeline,
            store,
            tokens,
            playlists,
            images,
            converter,
            temp_dir,
        }
    }

    pub fn token_calls(&self) -> usize {
        self.tokens.calls.load(Ordering::SeqCst)
    }

    pub fn playlist_calls(&self) -> usize {
        self.playlists.calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.images.calls.load(Ordering::SeqCst)
    }

    pub fn converter_calls(&self) -> usize {
        self.converter.calls.load(Ordering::SeqCst)
    }
}
