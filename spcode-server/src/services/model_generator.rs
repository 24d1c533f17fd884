//! Model generation stage
//!
//! Turns a persisted code image into `stl/<id>.stl` by running OpenSCAD
//! against a model template. Conversions are serialized, so at most one tool
//! process runs at a time.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;
use crate::services::artifact_store::ArtifactStore;
use crate::services::work_queue::WorkQueue;

/// Out-of-process CAD conversion
#[async_trait]
pub trait ModelConverter: Send + Sync {
    /// Convert the image at `svg` into a model written to `output`
    async fn convert(&self, svg: &Path, output: &Path) -> Result<(), PipelineError>;
}

/// OpenSCAD command-line converter
///
/// Runs `openscad <template> -o <output> -D svgPath="<svg>"`.
pub struct OpenScadConverter {
    binary: PathBuf,
    scad_file: PathBuf,
    timeout: Duration,
}

impl OpenScadConverter {
    pub fn new(binary: PathBuf, scad_file: PathBuf, timeout: Duration) -> Self {
        Self {
            binary,
            scad_file,
            timeout,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn svg_define(svg: &Path) -> String {
        let escaped = svg
            .display()
            .to_string()
            .replace('\\', "\\\\")
            .replace('"', "\\\"");
        format!("svgPath=\"{}\"", escaped)
    }
}

#[async_trait]
impl ModelConverter for OpenScadConverter {
    async fn convert(&self, svg: &Path, output: &Path) -> Result<(), PipelineError> {
        let mut command = tokio::process::Command::new(&self.binary);
        command
            .arg(&self.scad_file)
            .arg("-o")
            .arg(output)
            .arg("-D")
            .arg(Self::svg_define(svg))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(
            binary = %self.binary.display(),
            svg = %svg.display(),
            output = %output.display(),
            "Running OpenSCAD"
        );

        let result = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                return Err(PipelineError::Timeout(format!(
                    "OpenSCAD exceeded {}s for {}",
                    self.timeout.as_secs(),
                    svg.display()
                )))
            }
            Ok(Err(e)) => {
                return Err(PipelineError::ConversionFailed(format!(
                    "cannot run {}: {}",
                    self.binary.display(),
                    e
                )))
            }
            Ok(Ok(result)) => result,
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last_line = stderr.lines().last().unwrap_or_default();
            return Err(PipelineError::ConversionFailed(format!(
                "OpenSCAD exited with {}: {}",
                result.status, last_line
            )));
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct ModelStage {
    store: ArtifactStore,
    converter: Arc<dyn ModelConverter>,
    queue: WorkQueue,
}

impl ModelStage {
    pub fn new(store: ArtifactStore, converter: Arc<dyn ModelConverter>) -> Self {
        Self {
            store,
            converter,
            queue: WorkQueue::new("model"),
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Make sure `stl/<external_id>.stl` exists, converting if needed
    pub async fn ensure(&self, external_id: &str) -> Result<(), PipelineError> {
        if self.store.has_stl(external_id).await? {
            tracing::debug!(track = %external_id, "Model exists, skipping");
            return Ok(());
        }

        let this = self.clone();
        let external_id = external_id.to_string();
        self.queue
            .submit(async move { this.ensure_serialized(&external_id).await })
            .await?
    }

    async fn ensure_serialized(&self, external_id: &str) -> Result<(), PipelineError> {
        if self.store.has_stl(external_id).await? {
            return Ok(());
        }
        if !self.store.has_svg(external_id).await? {
            return Err(PipelineError::ConversionFailed(format!(
                "no code image for track {}",
                external_id
            )));
        }

        let svg = self.store.svg_path(external_id);
        let partial = self.store.partial_stl_path(external_id);

        if let Err(e) = self.converter.convert(&svg, &partial).await {
            self.store.discard_partial_stl(external_id).await;
            return Err(e);
        }

        if !self.store.promote_stl(external_id).await? {
            return Err(PipelineError::ConversionFailed(format!(
                "tool produced no model for track {}",
                external_id
            )));
        }

        tracing::info!(track = %external_id, "Model generated");
        Ok(())
    }
}
