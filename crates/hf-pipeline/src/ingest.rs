//! Segment ingestion pipeline.
//!
//! [`IngestPipeline::ingest_chunk`] drives one input chunk through every
//! rendition of the ladder and then rewrites the master playlist. Failures
//! are recorded per rendition in the returned [`IngestReport`]; nothing here
//! aborts the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use hf_av::Encoder;
use hf_core::config::{Config, DeclaredVariant};
use hf_core::{PlaylistKind, Resolution};
use hf_media::{
    layout, ladder_for, write_master_playlist, write_media_playlist, MediaPlaylistOutcome,
    Rendition, SegmentIndexTracker,
};

use crate::stats::IngestStats;
use crate::transcoder::transcode_rendition;

/// Everything the pipeline needs from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub root: PathBuf,
    pub segment_duration: u32,
    pub playlist_kind: PlaylistKind,
    pub resolutions: Vec<Resolution>,
    pub declared: Vec<DeclaredVariant>,
    pub parallel_renditions: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.output.root.clone(),
            segment_duration: config.output.segment_duration,
            playlist_kind: config.output.playlist_kind,
            resolutions: config.ladder.resolutions.clone(),
            declared: config.ladder.declared.clone(),
            parallel_renditions: config.encoder.parallel_renditions,
        }
    }
}

/// What happened to a rendition's media playlist after a transcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlaylistStatus {
    Written { segments: usize },
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenditionResult {
    Transcoded {
        start_index: u64,
        produced: u64,
        playlist: PlaylistStatus,
    },
    Failed {
        start_index: u64,
        error: String,
    },
    /// Stopped by the cancellation token; counter and playlist untouched.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenditionOutcome {
    pub rendition: String,
    pub bitrate_kbps: u32,
    #[serde(flatten)]
    pub result: RenditionResult,
}

/// Overall result of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Every rendition transcoded.
    Complete,
    /// Some renditions transcoded, some did not.
    Partial,
    /// No rendition transcoded.
    Failed,
    /// Nothing transcoded and at least one rendition was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub input: PathBuf,
    pub renditions: Vec<RenditionOutcome>,
    /// Set if the master playlist rewrite failed.
    pub master_error: Option<String>,
}

impl IngestReport {
    pub fn succeeded(&self) -> usize {
        self.renditions
            .iter()
            .filter(|r| matches!(r.result, RenditionResult::Transcoded { .. }))
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.renditions
            .iter()
            .filter(|r| matches!(r.result, RenditionResult::Cancelled))
            .count()
    }

    pub fn segments_produced(&self) -> u64 {
        self.renditions
            .iter()
            .map(|r| match r.result {
                RenditionResult::Transcoded { produced, .. } => produced,
                _ => 0,
            })
            .sum()
    }

    pub fn status(&self) -> ChunkStatus {
        let ok = self.succeeded();
        if ok > 0 && ok == self.renditions.len() {
            ChunkStatus::Complete
        } else if ok > 0 {
            ChunkStatus::Partial
        } else if self.cancelled() > 0 {
            ChunkStatus::Cancelled
        } else {
            ChunkStatus::Failed
        }
    }

    pub fn outcome(&self, rendition: &str) -> Option<&RenditionOutcome> {
        self.renditions.iter().find(|r| r.rendition == rendition)
    }
}

/// The per-chunk orchestrator.
///
/// Cloning is cheap and every clone shares the same encoder, tracker and
/// statistics, so live capture and batch ingestion can run side by side.
#[derive(Clone)]
pub struct IngestPipeline {
    encoder: Arc<dyn Encoder>,
    tracker: Arc<SegmentIndexTracker>,
    settings: Arc<PipelineSettings>,
    stats: Arc<IngestStats>,
}

impl IngestPipeline {
    /// Build a pipeline with a fresh tracker over `settings.root`.
    pub fn new(encoder: Arc<dyn Encoder>, settings: PipelineSettings) -> Self {
        let tracker = Arc::new(SegmentIndexTracker::new(settings.root.clone()));
        Self {
            encoder,
            tracker,
            settings: Arc::new(settings),
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    pub fn tracker(&self) -> &Arc<SegmentIndexTracker> {
        &self.tracker
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// Push one chunk through the whole ladder.
    ///
    /// `source_kbps` is the probed source bitrate; `None` yields the ladder
    /// floors. The master playlist is rewritten exactly once, whatever the
    /// renditions did.
    pub async fn ingest_chunk(
        &self,
        input: &Path,
        source_kbps: Option<u32>,
        cancel: &CancellationToken,
    ) -> IngestReport {
        let ladder = ladder_for(source_kbps, &self.settings.resolutions);
        tracing::info!(
            input = %input.display(),
            renditions = ladder.len(),
            source_kbps = ?source_kbps,
            "Ingesting chunk"
        );

        self.prepare_dirs(&ladder);

        let renditions = if self.settings.parallel_renditions {
            futures::future::join_all(
                ladder
                    .iter()
                    .map(|rendition| self.ingest_rendition(input, rendition, cancel)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(ladder.len());
            for rendition in &ladder {
                outcomes.push(self.ingest_rendition(input, rendition, cancel).await);
            }
            outcomes
        };

        let master_error = match write_master_playlist(&self.settings.root, &self.settings.declared)
        {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(error = %e, "Master playlist rewrite failed");
                Some(e.to_string())
            }
        };

        let report = IngestReport {
            input: input.to_path_buf(),
            renditions,
            master_error,
        };

        match report.status() {
            ChunkStatus::Complete => tracing::info!(
                input = %input.display(),
                segments = report.segments_produced(),
                "Chunk ingested"
            ),
            ChunkStatus::Partial => tracing::warn!(
                input = %input.display(),
                succeeded = report.succeeded(),
                total = report.renditions.len(),
                "Chunk partially ingested"
            ),
            ChunkStatus::Failed => {
                tracing::error!(input = %input.display(), "Every rendition failed for chunk")
            }
            ChunkStatus::Cancelled => {
                tracing::info!(input = %input.display(), "Chunk ingestion cancelled")
            }
        }

        self.stats.record(&report);
        report
    }

    /// Create the output root and every rendition directory up front, so the
    /// master playlist never points at a directory that does not exist.
    fn prepare_dirs(&self, ladder: &[Rendition]) {
        let names = ladder
            .iter()
            .map(|r| r.name.as_str())
            .chain(self.settings.declared.iter().map(|d| d.name.as_str()));
        for name in names {
            let dir = layout::rendition_dir(&self.settings.root, name);
            if let Err(e) = std::fs::create_dir_all(&dir) {
                tracing::warn!(rendition = name, error = %e, "Could not create {}", dir.display());
            }
        }
    }

    async fn ingest_rendition(
        &self,
        input: &Path,
        rendition: &Rendition,
        cancel: &CancellationToken,
    ) -> RenditionOutcome {
        let outcome = |result: RenditionResult| RenditionOutcome {
            rendition: rendition.name.clone(),
            bitrate_kbps: rendition.bitrate_kbps,
            result,
        };

        if cancel.is_cancelled() {
            return outcome(RenditionResult::Cancelled);
        }

        let mut guard = self.tracker.lock(&rendition.name).await;
        let start_index = guard.next_start_index();

        let produced = match transcode_rendition(
            self.encoder.as_ref(),
            &self.settings.root,
            input,
            rendition,
            start_index,
            self.settings.segment_duration,
            cancel,
        )
        .await
        {
            Ok(produced) => produced,
            Err(e) if e.is_cancelled() => {
                tracing::info!(rendition = %rendition.name, "Transcode cancelled");
                return outcome(RenditionResult::Cancelled);
            }
            Err(e) => {
                tracing::warn!(
                    rendition = %rendition.name,
                    start_index,
                    error = %e,
                    "Transcode failed; continuing with remaining renditions"
                );
                return outcome(RenditionResult::Failed {
                    start_index,
                    error: e.to_string(),
                });
            }
        };

        guard.advance(produced);

        let playlist = match write_media_playlist(
            &self.settings.root,
            &rendition.name,
            self.settings.segment_duration,
            self.settings.playlist_kind,
        ) {
            Ok(MediaPlaylistOutcome::Written { segments }) => PlaylistStatus::Written { segments },
            Ok(MediaPlaylistOutcome::Skipped) => PlaylistStatus::Skipped,
            Err(e) => {
                tracing::warn!(rendition = %rendition.name, error = %e, "Media playlist rewrite failed");
                PlaylistStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        drop(guard);

        tracing::info!(
            rendition = %rendition.name,
            start_index,
            produced,
            bitrate_kbps = rendition.bitrate_kbps,
            "Rendition transcoded"
        );

        outcome(RenditionResult::Transcoded {
            start_index,
            produced,
            playlist,
        })
    }
}
