//! On-disk pipeline artifacts
//!
//! `svg/<id>.svg` and `stl/<id>.stl` are the completion ledger: a non-empty
//! file at the deterministic path means the stage is done for that track.
//! Writes go to a sibling temporary path first and are renamed into place, so
//! an interrupted write never looks complete.

use std::io;
use std::path::{Path, PathBuf};

use spcode_common::config::DataFolderInitializer;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    svg_dir: PathBuf,
    stl_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(folder: &DataFolderInitializer) -> Self {
        Self {
            svg_dir: folder.svg_dir(),
            stl_dir: folder.stl_dir(),
        }
    }

    pub fn svg_path(&self, external_id: &str) -> PathBuf {
        self.svg_dir.join(format!("{}.svg", external_id))
    }

    pub fn stl_path(&self, external_id: &str) -> PathBuf {
        self.stl_dir.join(format!("{}.stl", external_id))
    }

    /// Output path handed to the CAD tool; keeps the `.stl` extension
    /// because the tool picks its export format from it
    pub fn partial_stl_path(&self, external_id: &str) -> PathBuf {
        self.stl_dir.join(format!("{}.partial.stl", external_id))
    }

    pub async fn has_svg(&self, external_id: &str) -> io::Result<bool> {
        is_present(&self.svg_path(external_id)).await
    }

    pub async fn has_stl(&self, external_id: &str) -> io::Result<bool> {
        is_present(&self.stl_path(external_id)).await
    }

    /// Persist a processed code image atomically
    pub async fn write_svg(&self, external_id: &str, contents: &str) -> io::Result<PathBuf> {
        let target = self.svg_path(external_id);
        let partial = self.svg_dir.join(format!("{}.svg.partial", external_id));

        tokio::fs::write(&partial, contents).await?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        Ok(target)
    }

    /// Move a finished CAD output into place; false if the tool left nothing usable
    pub async fn promote_stl(&self, external_id: &str) -> io::Result<bool> {
        let partial = self.partial_stl_path(external_id);
        if !is_present(&partial).await? {
            self.discard_partial_stl(external_id).await;
            return Ok(false);
        }
        tokio::fs::rename(&partial, self.stl_path(external_id)).await?;
        Ok(true)
    }

    pub async fn discard_partial_stl(&self, external_id: &str) {
        let partial = self.partial_stl_path(external_id);
        match tokio::fs::remove_file(&partial).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %partial.display(), error = %e, "Could not remove partial model"),
        }
    }
}

/// Exists as a regular, non-empty file
async fn is_present(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
