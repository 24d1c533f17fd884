//! Upstream service clients
//!
//! The pipeline talks to three HTTP services: the anonymous token endpoint,
//! the playlist metadata API and the scannable-code image service. Each is
//! reached through a trait so tests can substitute in-process fakes.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::error::{upstream_error, PipelineError};
use crate::models::{AccessToken, PlaylistId};

const USER_AGENT: &str = concat!("spcode/", env!("CARGO_PKG_VERSION"));

/// Token acquisition failure
///
/// Cloneable because one acquisition result is handed to every caller that
/// awaited it.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("token request timed out")]
    Timeout,

    #[error("token request failed: {0}")]
    Request(String),

    #[error("token response carried no access_token")]
    Missing,
}

impl From<TokenError> for PipelineError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Timeout => PipelineError::Timeout("token endpoint".to_string()),
            other => PipelineError::Upstream(other.to_string()),
        }
    }
}

/// Source of bearer credentials
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, TokenError>;
}

/// Source of playlist metadata
///
/// Implementations return `PipelineError::AuthExpired` when the credential
/// was rejected.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    async fn fetch_playlist(
        &self,
        playlist: &PlaylistId,
        token: &AccessToken,
    ) -> Result<PlaylistPayload, PipelineError>;
}

/// Source of raw scannable-code SVG documents
#[async_trait]
pub trait CodeImageSource: Send + Sync {
    async fn fetch_svg(&self, external_id: &str) -> Result<String, PipelineError>;
}

/// Playlist metadata response (subset)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistPayload {
    pub name: Option<String>,
    pub tracks: Option<PlaylistTracks>,
    /// Present when the API answered with an error object
    pub error: Option<UpstreamErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistTracks {
    pub items: Option<Vec<PlaylistItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    /// Null for tracks that are no longer available
    pub track: Option<TrackPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackPayload {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<ArtistPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamErrorBody {
    pub status: u16,
    #[serde(default)]
    pub message: String,
}

impl UpstreamErrorBody {
    pub fn is_auth_expired(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Shared HTTP client with the upstream timeout applied to every call
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| PipelineError::Upstream(format!("HTTP client setup failed: {}", e)))
}

/// Anonymous token endpoint client
pub struct TokenClient {
    http_client: reqwest::Client,
    url: String,
}

impl TokenClient {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TokenSource for TokenClient {
    async fn fetch_token(&self) -> Result<AccessToken, TokenError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                TokenError::Timeout
            } else {
                TokenError::Request(e.to_string())
            }
        };

        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(map_err)?;

        let body: TokenResponse = response.json().await.map_err(map_err)?;

        match body.access_token {
            Some(token) if !token.trim().is_empty() => Ok(AccessToken::new(token)),
            _ => Err(TokenError::Missing),
        }
    }
}

/// Playlist metadata API client
pub struct PlaylistClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PlaylistClient {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PlaylistSource for PlaylistClient {
    async fn fetch_playlist(
        &self,
        playlist: &PlaylistId,
        token: &AccessToken,
    ) -> Result<PlaylistPayload, PipelineError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), playlist);
        tracing::debug!(playlist = %playlist, url = %url, "Querying playlist API");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| upstream_error("playlist API", e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PipelineError::AuthExpired);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(PipelineError::NoTracksFound(playlist.to_string()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| upstream_error("playlist API", e))?;
        let parsed = serde_json::from_slice::<PlaylistPayload>(&body);

        if !status.is_success() {
            let auth_expired = matches!(
                &parsed,
                Ok(PlaylistPayload { error: Some(error), .. }) if error.is_auth_expired()
            );
            if auth_expired {
                return Err(PipelineError::AuthExpired);
            }
            return Err(PipelineError::Upstream(format!(
                "playlist API returned {} for {}",
                status, playlist
            )));
        }

        // A 2xx body of the wrong shape carries no usable track list
        let payload = parsed.map_err(|e| {
            tracing::warn!(playlist = %playlist, error = %e, "Malformed playlist payload");
            PipelineError::NoTracksFound(playlist.to_string())
        })?;

        if let Some(error) = &payload.error {
            if error.is_auth_expired() {
                return Err(PipelineError::AuthExpired);
            }
        }

        Ok(payload)
    }
}

/// Scannable-code image service client
pub struct ScannableClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ScannableClient {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CodeImageSource for ScannableClient {
    async fn fetch_svg(&self, external_id: &str) -> Result<String, PipelineError> {
        let url = format!(
            "{}/spotify:track:{}",
            self.base_url.trim_end_matches('/'),
            external_id
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| upstream_error("scannable image service", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Upstream(format!(
                "scannable image service returned {} for {}",
                status, external_id
            )));
        }

        response
            .text()
            .await
            .map_err(|e| upstream_error("scannable image service", e))
    }
}
