//! The [`Encoder`] trait: the narrow interface between the ingestion
//! pipeline and whatever engine actually encodes video.
//!
//! Jobs are plain data so the pipeline can be exercised against a scripted
//! encoder in tests without ffmpeg installed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use hf_core::Resolution;

use crate::frame::Frame;

/// Transcode one input chunk into one rendition's HLS segments.
#[derive(Debug, Clone)]
pub struct RenditionJob {
    /// Chunk to encode.
    pub input: PathBuf,
    /// Rendition name, used in error messages.
    pub rendition: String,
    pub resolution: Resolution,
    /// Target and cap bitrate in kbps.
    pub bitrate_kbps: u32,
    /// Sequence number of the first segment this job writes.
    pub start_index: u64,
    /// Segment duration in seconds; keyframes are forced on this grid.
    pub segment_duration: u32,
    /// printf-style segment path, e.g. `<root>/low/segment-low-%03d.ts`.
    pub segment_pattern: PathBuf,
}

/// Encode a batch of raw frames into an intermediate container.
#[derive(Debug, Clone)]
pub struct MaterializeJob<'a> {
    pub frames: &'a [Frame],
    pub fps: u32,
    /// Codec for the intermediate file (e.g. `mpeg4`).
    pub codec: String,
    pub output: PathBuf,
}

/// Normalise a source video to H.264 at a fixed size and bitrate.
#[derive(Debug, Clone)]
pub struct CompressJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub resolution: Resolution,
    pub bitrate: String,
    pub bufsize: String,
    pub preset: String,
    pub tune: String,
}

/// Cut a video into fixed-duration MP4 chunks named `chunk_NNNN.mp4`.
#[derive(Debug, Clone)]
pub struct SplitJob {
    pub input: PathBuf,
    pub chunk_dir: PathBuf,
    pub chunk_seconds: u32,
    /// Re-encode bitrate in kbps; `None` lets the encoder choose.
    pub bitrate_kbps: Option<u32>,
}

/// A video encoding engine.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Human-readable name identifying this engine.
    fn name(&self) -> &'static str;

    /// Run one rendition transcode. Succeeds only if the engine exited
    /// cleanly; the caller inspects the output directory to learn how many
    /// segments were written.
    ///
    /// Must return [`hf_core::Error::Cancelled`] if `cancel` fires first.
    async fn encode_rendition(
        &self,
        job: &RenditionJob,
        cancel: &CancellationToken,
    ) -> hf_core::Result<()>;

    /// Write `job.frames` to `job.output` as a playable container.
    async fn materialize_frames(
        &self,
        job: &MaterializeJob<'_>,
        cancel: &CancellationToken,
    ) -> hf_core::Result<()>;

    /// Produce the normalised H.264 source.
    async fn compress_source(&self, job: &CompressJob) -> hf_core::Result<()>;

    /// Split a source into chunks inside `job.chunk_dir`.
    async fn split_source(&self, job: &SplitJob) -> hf_core::Result<()>;
}

/// Sorted list of `*.mp4` chunk files in a directory.
pub fn list_chunks(dir: &Path) -> hf_core::Result<Vec<PathBuf>> {
    let mut chunks: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "mp4"))
        .collect();
    chunks.sort();
    Ok(chunks)
}
