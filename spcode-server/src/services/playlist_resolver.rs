//! Playlist metadata resolution with a TTL cache
//!
//! Every lookup runs through the resolver's own work queue, so concurrent
//! requests never race to populate the cache.

use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;
use crate::models::{is_valid_external_id, PlaylistId, PlaylistInfo, Track};
use crate::services::token_manager::TokenManager;
use crate::services::ttl_cache::TtlCache;
use crate::services::upstream::{PlaylistPayload, PlaylistSource};
use crate::services::work_queue::WorkQueue;

#[derive(Clone)]
pub struct PlaylistResolver {
    cache: Arc<TtlCache<PlaylistId, Arc<PlaylistInfo>>>,
    tokens: TokenManager,
    source: Arc<dyn PlaylistSource>,
    queue: WorkQueue,
}

impl PlaylistResolver {
    pub fn new(tokens: TokenManager, source: Arc<dyn PlaylistSource>, ttl: Duration) -> Self {
        Self {
            cache: Arc::new(TtlCache::new(ttl)),
            tokens,
            source,
            queue: WorkQueue::new("playlist"),
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn cached_playlists(&self) -> usize {
        self.cache.len()
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Resolve `playlist`, serving from cache within the TTL
    ///
    /// A rejected credential triggers a token refresh and fails this call
    /// with `AuthExpired`; the caller retries.
    pub async fn resolve(&self, playlist: &PlaylistId) -> Result<Arc<PlaylistInfo>, PipelineError> {
        let this = self.clone();
        let playlist = playlist.clone();
        self.queue
            .submit(async move { this.resolve_serialized(playlist).await })
            .await?
    }

    async fn resolve_serialized(
        &self,
        playlist: PlaylistId,
    ) -> Result<Arc<PlaylistInfo>, PipelineError> {
        if let Some(info) = self.cache.get(&playlist) {
            tracing::debug!(playlist = %playlist, "Playlist cache hit");
            return Ok(info);
        }

        let token = self.tokens.current_token().await?;

        let payload = match self.source.fetch_playlist(&playlist, &token).await {
            Ok(payload) => payload,
            Err(PipelineError::AuthExpired) => {
                tracing::warn!(playlist = %playlist, "Upstream token expired, refreshing");
                drop(self.tokens.refresh());
                return Err(PipelineError::AuthExpired);
            }
            Err(e) => return Err(e),
        };

        let info = Arc::new(into_playlist_info(&playlist, payload)?);
        tracing::info!(
            playlist = %playlist,
            name = %info.name,
            tracks = info.tracks.len(),
            "Playlist resolved and cached"
        );
        self.cache.insert(playlist, Arc::clone(&info));

        Ok(info)
    }
}

/// Map the upstream payload, skipping unavailable or unaddressable tracks
pub fn into_playlist_info(
    playlist: &PlaylistId,
    payload: PlaylistPayload,
) -> Result<PlaylistInfo, PipelineError> {
    let items = payload
        .tracks
        .and_then(|tracks| tracks.items)
        .ok_or_else(|| PipelineError::NoTracksFound(playlist.to_string()))?;

    let tracks = items
        .into_iter()
        .filter_map(|item| item.track)
        .map(|track| {
            Track::from_upstream(
                &track.name,
                track.artists.iter().map(|a| a.name.as_str()),
                &track.uri,
            )
        })
        .filter(|track| {
            let keep = is_valid_external_id(&track.external_id);
            if !keep {
                tracing::debug!(playlist = %playlist, track = %track.display_name, "Skipping track without a usable id");
            }
            keep
        })
        .collect();

    Ok(PlaylistInfo {
        name: payload.name.unwrap_or_default(),
        tracks,
    })
}
