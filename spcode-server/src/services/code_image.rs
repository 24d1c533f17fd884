//! Scannable code image stage

use std::sync::Arc;

use crate::error::PipelineError;
use crate::services::artifact_store::ArtifactStore;
use crate::services::upstream::CodeImageSource;
use crate::services::work_queue::WorkQueue;

/// Closing tag the last line of a well-formed response must equal
const SVG_CLOSING_TAG: &str = "</svg>";

#[derive(Clone)]
pub struct CodeImageStage {
    store: ArtifactStore,
    source: Arc<dyn CodeImageSource>,
    queue: WorkQueue,
}

impl CodeImageStage {
    pub fn new(store: ArtifactStore, source: Arc<dyn CodeImageSource>) -> Self {
        Self {
            store,
            source,
            queue: WorkQueue::new("code_image"),
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Make sure `svg/<external_id>.svg` exists, fetching it if needed
    pub async fn ensure(&self, external_id: &str) -> Result<(), PipelineError> {
        if self.store.has_svg(external_id).await? {
            tracing::debug!(track = %external_id, "Code image exists, skipping");
            return Ok(());
        }

        let this = self.clone();
        let external_id = external_id.to_string();
        self.queue
            .submit(async move { this.ensure_serialized(&external_id).await })
            .await?
    }

    async fn ensure_serialized(&self, external_id: &str) -> Result<(), PipelineError> {
        // Another request may have produced it while this one waited
        if self.store.has_svg(external_id).await? {
            return Ok(());
        }

        let raw = self.source.fetch_svg(external_id).await?;
        tracing::debug!(track = %external_id, bytes = raw.len(), "Code image downloaded");

        let processed = process_svg(&raw)
            .ok_or_else(|| PipelineError::MalformedImage(external_id.to_string()))?;

        let path = self.store.write_svg(external_id, &processed).await?;
        tracing::info!(track = %external_id, path = %path.display(), "Code image saved");
        Ok(())
    }
}

/// Validate and clean a raw response
///
/// Returns `None` unless the last line is exactly `</svg>`. The second line
/// of the upstream document is an artifact of its response format and is
/// dropped.
pub fn process_svg(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split('\n').collect();
    if lines.last() != Some(&SVG_CLOSING_TAG) {
        return None;
    }

    Some(
        lines
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != 1)
            .map(|(_, line)| *line)
            .collect::<Vec<_>>()
            .join("\n"),
    )
}
