//! spcode-server - playlist to printable scan-code models
//!
//! Resolves a playlist, downloads the scannable code image of each requested
//! track and converts it into an STL model with OpenSCAD. Serves the pipeline
//! over HTTP (`serve`, the default) or runs it once from the command line
//! (`generate`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spcode_common::config::{self, DataFolderInitializer, TomlConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spcode_server::models::{PlaylistId, TrackRange};
use spcode_server::services::{ArtifactStore, Pipeline};
use spcode_server::{build_pipeline, build_router, AppState, PipelineDeps};

/// Command-line arguments for spcode-server
#[derive(Parser, Debug)]
#[command(name = "spcode-server")]
#[command(about = "Generates 3D-printable scan-code models for playlist tracks")]
#[command(version)]
struct Args {
    /// TOML bootstrap config file
    #[arg(short, long, env = config::CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Data folder holding svg/ and stl/
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// OpenSCAD executable
    #[arg(long)]
    openscad: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "SPCODE_PORT")]
        port: Option<u16>,

        /// Address to bind
        #[arg(short, long, env = "SPCODE_BIND_ADDR")]
        bind: Option<String>,
    },
    /// Generate models for the first tracks of a playlist and exit
    Generate {
        /// Playlist id, URI or URL
        playlist: String,

        /// Number of tracks from the start of the playlist
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        config::load_config(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let level = toml_config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "spcode_server={0},spcode_common={0},tower_http={0}",
                    level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting spcode-server v{}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve and prepare the data folder
    let data_dir = config::resolve_data_dir(args.data_dir.as_deref(), &toml_config);
    let data_dir = if data_dir.is_absolute() {
        data_dir
    } else {
        std::env::current_dir()
            .context("Failed to read working directory")?
            .join(data_dir)
    };
    let folder = DataFolderInitializer::new(data_dir);
    folder
        .ensure_layout()
        .context("Failed to initialize data folder")?;
    info!("Data folder: {}", folder.root().display());

    // Step 2: Resolve the CAD tool
    let openscad = config::resolve_openscad_binary(args.openscad.as_deref(), &toml_config);
    info!("OpenSCAD: {}", openscad.display());
    if !toml_config.openscad.scad_file.exists() {
        warn!(
            "Model template {} not found, conversions will fail",
            toml_config.openscad.scad_file.display()
        );
    }

    // Step 3: Wire the pipeline
    let deps = PipelineDeps::from_config(&toml_config, openscad)
        .context("Failed to build upstream clients")?;
    let pipeline = build_pipeline(
        ArtifactStore::new(&folder),
        deps,
        Duration::from_secs(toml_config.playlist_cache_ttl_secs),
    );

    match args.command {
        Some(Command::Generate { playlist, limit }) => generate(pipeline, &playlist, limit).await,
        Some(Command::Serve { port, bind }) => serve(pipeline, &toml_config, port, bind).await,
        None => serve(pipeline, &toml_config, None, None).await,
    }
}

async fn serve(
    pipeline: Pipeline,
    toml_config: &TomlConfig,
    port: Option<u16>,
    bind: Option<String>,
) -> Result<()> {
    if let Err(e) = pipeline.prefetch_token().await {
        warn!("Initial token acquisition failed, retrying on first request: {}", e);
    }

    let bind = bind.unwrap_or_else(|| toml_config.bind_addr.clone());
    let port = port.unwrap_or(toml_config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let app = build_router(AppState::new(pipeline));

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn generate(pipeline: Pipeline, playlist: &str, limit: usize) -> Result<()> {
    let playlist = PlaylistId::parse(playlist).context("Invalid playlist")?;

    info!(playlist = %playlist, limit, "Batch generation");
    let info = pipeline
        .generate(&playlist, TrackRange::prefix(limit))
        .await
        .with_context(|| format!("Generation failed for playlist {}", playlist))?;

    println!("{}", info.name);
    for track in &info.tracks {
        let path = pipeline.model_path(&track.external_id).await?;
        println!("{}\t{}", path.display(), track.display_name);
    }

    info!(playlist = %playlist, models = info.tracks.len(), "Batch generation complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
