//! Domain types shared by the pipeline and the HTTP layer

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Largest number of tracks a single HTTP request may cover
pub const MAX_TRACKS_PER_REQUEST: i64 = 3;

/// Bearer credential for the playlist metadata API
///
/// Debug output is redacted so the value never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// One playlist entry
///
/// Serialized as `{ "name", "uri" }`, the shape clients of the HTTP API read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// `"<title> - <artist>,<artist>"`
    #[serde(rename = "name")]
    pub display_name: String,
    /// Bare track id, also the artifact file stem
    #[serde(rename = "uri")]
    pub external_id: String,
}

impl Track {
    /// Build from upstream fields: track title, artist names and full URI
    pub fn from_upstream<'a>(
        title: &str,
        artists: impl IntoIterator<Item = &'a str>,
        uri: &str,
    ) -> Self {
        let artists: Vec<&str> = artists.into_iter().collect();
        Self {
            display_name: format!("{} - {}", title, artists.join(",")),
            external_id: external_id_from_uri(uri).to_string(),
        }
    }
}

/// Strip scheme and type prefix: `spotify:track:abc` → `abc`
pub fn external_id_from_uri(uri: &str) -> &str {
    uri.rsplit(':').next().unwrap_or(uri)
}

/// Resolved playlist metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistInfo {
    pub name: String,
    pub tracks: Vec<Track>,
}

/// Normalized playlist identifier
///
/// Accepts a bare id, a `spotify:playlist:<id>` URI or an
/// `https://open.spotify.com/playlist/<id>?si=...` link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaylistId(String);

impl PlaylistId {
    pub fn parse(input: &str) -> Result<Self, PipelineError> {
        let trimmed = input.trim();

        let candidate = if let Some((_, rest)) = trimmed.split_once("/playlist/") {
            rest.split(['?', '#', '/']).next().unwrap_or_default()
        } else {
            external_id_from_uri(trimmed)
        };

        if candidate.is_empty() || !candidate.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PipelineError::InvalidPlaylist(input.to_string()));
        }

        Ok(Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-open `[start, end)` slice of a playlist's tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackRange {
    start: usize,
    end: usize,
}

impl TrackRange {
    /// Range requested over HTTP, at most `MAX_TRACKS_PER_REQUEST` wide
    pub fn requested(start: i64, end: i64) -> Result<Self, PipelineError> {
        if start < 0 || end < 0 || end - start > MAX_TRACKS_PER_REQUEST {
            return Err(PipelineError::InvalidRange(format!("{}..{}", start, end)));
        }
        Ok(Self {
            start: start as usize,
            end: end as usize,
        })
    }

    /// The first `limit` tracks, used by batch generation
    pub fn prefix(limit: usize) -> Self {
        Self {
            start: 0,
            end: limit,
        }
    }

    /// Apply to `tracks`, clamping to its length; `end < start` is empty
    pub fn slice<'a, T>(&self, tracks: &'a [T]) -> &'a [T] {
        let start = self.start.min(tracks.len());
        let end = self.end.clamp(start, tracks.len());
        &tracks[start..end]
    }
}

impl fmt::Display for TrackRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Checks a track id before it becomes part of a file path
pub fn is_valid_external_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}
