//! Bootstrap configuration and data folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the service logs a warning and starts
//! with compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "SPCODE_CONFIG";

/// Environment variable overriding the data folder
pub const DATA_DIR_ENV: &str = "SPCODE_DATA_DIR";

/// Environment variable selecting the OpenSCAD binary
pub const OPENSCAD_PATH_ENV: &str = "SPCODE_OPENSCAD_PATH";

/// OpenSCAD binary used when nothing else is configured
pub const DEFAULT_OPENSCAD_PATH: &str = "/usr/local/bin/openscad";

/// Subdirectory holding processed scannable-code images
pub const SVG_DIR: &str = "svg";

/// Subdirectory holding generated models
pub const STL_DIR: &str = "stl";

/// Bootstrap configuration loaded from TOML file
///
/// Every field has a compiled default, so an empty file (or no file at all)
/// is a valid configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder containing the `svg/` and `stl/` artifact directories
    pub data_dir: Option<PathBuf>,

    /// Address the HTTP listener binds to
    pub bind_addr: String,

    /// HTTP listener port
    pub port: u16,

    /// Lifetime of a cached playlist lookup
    pub playlist_cache_ttl_secs: u64,

    pub logging: LoggingConfig,

    pub upstream: UpstreamConfig,

    pub openscad: OpenScadConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            playlist_cache_ttl_secs: 60,
            logging: LoggingConfig::default(),
            upstream: UpstreamConfig::default(),
            openscad: OpenScadConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Endpoints of the upstream services
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Anonymous token endpoint returning `{ "access_token": ... }`
    pub token_url: String,

    /// Playlist metadata base URL; the playlist id is appended as a path segment
    pub playlist_url: String,

    /// Scannable image base URL; `spotify:track:<id>` is appended
    pub scannable_url: String,

    /// Request timeout applied to every upstream call
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            token_url: "https://spotifycodes.com/getToken.php".to_string(),
            playlist_url: "https://api.spotify.com/v1/users/spotify/playlists".to_string(),
            scannable_url: "https://scannables.scdn.co/uri/plain/svg/000000/white/640"
                .to_string(),
            timeout_secs: 30,
        }
    }
}

/// External CAD tool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenScadConfig {
    /// OpenSCAD binary; overridden by `SPCODE_OPENSCAD_PATH`
    pub binary: Option<PathBuf>,

    /// Model template that imports the code image via the `svgPath` variable
    pub scad_file: PathBuf,

    /// Upper bound on a single conversion
    pub timeout_secs: u64,
}

impl Default for OpenScadConfig {
    fn default() -> Self {
        Self {
            binary: None,
            scad_file: PathBuf::from("spcode.scad"),
            timeout_secs: 120,
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the bootstrap configuration
///
/// An explicitly named file must exist and parse. Without one, the platform
/// config file (`<config_dir>/spcode/config.toml`) is used when present,
/// otherwise compiled defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        info!("Loading config from {}", path.display());
        return load_toml_config(path);
    }

    match default_config_file() {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        _ => {
            warn!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Platform config file location
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spcode").join("config.toml"))
}

/// Resolve the data folder: CLI argument → environment → TOML → OS default
pub fn resolve_data_dir(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.data_dir {
        return path.clone();
    }

    default_data_dir()
}

/// Resolve the OpenSCAD binary: CLI argument → environment → TOML → default
pub fn resolve_openscad_binary(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(OPENSCAD_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    config
        .openscad
        .binary
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OPENSCAD_PATH))
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("spcode"))
        .unwrap_or_else(|| PathBuf::from("./spcode_data"))
}

/// Prepares the data folder layout before the service accepts work
///
/// The `svg/` and `stl/` directories are the only completion ledger the
/// pipeline has, so startup fails when they cannot be created or written.
#[derive(Debug, Clone)]
pub struct DataFolderInitializer {
    root: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn svg_dir(&self) -> PathBuf {
        self.root.join(SVG_DIR)
    }

    pub fn stl_dir(&self) -> PathBuf {
        self.root.join(STL_DIR)
    }

    /// Create the artifact directories and verify they accept writes
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.svg_dir(), self.stl_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::DataFolder(format!("cannot create {}: {}", dir.display(), e))
            })?;

            let probe = dir.join(".write-probe");
            std::fs::write(&probe, b"ok").map_err(|e| {
                Error::DataFolder(format!("{} is not writable: {}", dir.display(), e))
            })?;
            std::fs::remove_file(&probe)?;
        }

        info!("Data folder ready: {}", self.root.display());
        Ok(())
    }
}
