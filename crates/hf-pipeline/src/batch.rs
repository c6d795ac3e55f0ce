//! Batch ingestion of a directory of pre-cut chunks.

use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::ingest::{ChunkStatus, IngestPipeline, IngestReport};

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub chunks: Vec<IngestReport>,
    /// Chunks never started because the stop signal fired.
    pub not_started: usize,
}

impl BatchReport {
    pub fn count(&self, status: ChunkStatus) -> usize {
        self.chunks.iter().filter(|c| c.status() == status).count()
    }

    pub fn segments_produced(&self) -> u64 {
        self.chunks.iter().map(IngestReport::segments_produced).sum()
    }
}

/// Ingest every `*.mp4` in `dir`, in file name order, one chunk at a time.
///
/// A failed chunk is logged and counted; the next chunk still runs. Once
/// `cancel` fires no further chunk is started.
pub async fn ingest_directory(
    pipeline: &IngestPipeline,
    dir: &Path,
    source_kbps: Option<u32>,
    cancel: &CancellationToken,
) -> hf_core::Result<BatchReport> {
    let chunks = hf_av::list_chunks(dir)?;
    tracing::info!(chunks = chunks.len(), "Batch ingesting {}", dir.display());

    let mut report = BatchReport::default();
    for (i, chunk) in chunks.iter().enumerate() {
        if cancel.is_cancelled() {
            report.not_started = chunks.len() - i;
            tracing::info!(remaining = report.not_started, "Batch ingestion stopped");
            break;
        }
        report
            .chunks
            .push(pipeline.ingest_chunk(chunk, source_kbps, cancel).await);
    }

    tracing::info!(
        complete = report.count(ChunkStatus::Complete),
        partial = report.count(ChunkStatus::Partial),
        failed = report.count(ChunkStatus::Failed),
        segments = report.segments_produced(),
        "Batch ingestion finished"
    );
    Ok(report)
}
