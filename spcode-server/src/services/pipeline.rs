//! Pipeline orchestration
//!
//! playlist resolution → code image per track → model per track
//!
//! All images of the requested slice are ensured before any model, so a
//! slow conversion never delays image downloads for the same request.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::models::{is_valid_external_id, PlaylistId, PlaylistInfo, TrackRange};
use crate::services::artifact_store::ArtifactStore;
use crate::services::code_image::CodeImageStage;
use crate::services::model_generator::ModelStage;
use crate::services::playlist_resolver::PlaylistResolver;

/// Pending jobs per serialization queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueDepths {
    pub playlist: usize,
    pub code_image: usize,
    pub model: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    resolver: PlaylistResolver,
    images: CodeImageStage,
    models: ModelStage,
    store: ArtifactStore,
}

impl Pipeline {
    pub fn new(
        resolver: PlaylistResolver,
        images: CodeImageStage,
        models: ModelStage,
        store: ArtifactStore,
    ) -> Self {
        Self {
            resolver,
            images,
            models,
            store,
        }
    }

    /// Acquire the first upstream token ahead of the first request
    pub async fn prefetch_token(&self) -> Result<(), PipelineError> {
        self.resolver.tokens().current_token().await?;
        Ok(())
    }

    /// Validate a client request and run it
    ///
    /// The range guard and identifier check happen before any I/O.
    pub async fn process_request(
        &self,
        playlist_uri: &str,
        start: i64,
        end: i64,
    ) -> Result<PlaylistInfo, PipelineError> {
        let range = TrackRange::requested(start, end)?;
        let playlist = PlaylistId::parse(playlist_uri)?;
        self.generate(&playlist, range).await
    }

    /// Run all three stages for `range` of `playlist`
    ///
    /// Returns the playlist name and the sliced track list.
    pub async fn generate(
        &self,
        playlist: &PlaylistId,
        range: TrackRange,
    ) -> Result<PlaylistInfo, PipelineError> {
        tracing::debug!(playlist = %playlist, range = %range, "Pipeline run");

        let info = self.resolver.resolve(playlist).await?;
        let tracks = range.slice(&info.tracks).to_vec();

        for track in &tracks {
            self.images.ensure(&track.external_id).await?;
        }

        for track in &tracks {
            self.models.ensure(&track.external_id).await?;
        }

        Ok(PlaylistInfo {
            name: info.name.clone(),
            tracks,
        })
    }

    /// Path of a generated model, if it exists
    pub async fn model_path(&self, external_id: &str) -> Result<PathBuf, PipelineError> {
        if !is_valid_external_id(external_id) {
            return Err(PipelineError::NotFound(external_id.to_string()));
        }
        if !self.store.has_stl(external_id).await? {
            return Err(PipelineError::NotFound(format!("{}.stl", external_id)));
        }
        Ok(self.store.stl_path(external_id))
    }

    pub fn queue_depths(&self) -> QueueDepths {
        QueueDepths {
            playlist: self.resolver.queue().pending(),
            code_image: self.images.queue().pending(),
            model: self.models.queue().pending(),
        }
    }

    pub fn cached_playlists(&self) -> usize {
        self.resolver.cached_playlists()
    }
}
