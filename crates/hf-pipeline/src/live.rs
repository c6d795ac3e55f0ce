//! Live capture: raw frames in, ingested chunks out.
//!
//! [`LiveCapture`] buffers frames until `fps * chunk_seconds` have arrived,
//! then flushes: the batch is materialized into an intermediate container in
//! the work directory, handed to the [`IngestPipeline`] as one chunk, and the
//! intermediate is deleted. The buffer is emptied before the flush runs, so a
//! failed chunk is dropped rather than retried. A chunk that no rendition
//! managed to transcode counts as dropped too.
//!
//! [`RawFrameSource`] stands in for a capture device by decoding a video
//! file to BGR24 frames through ffmpeg.

use std::path::PathBuf;
use std::process::Stdio;

use bytes::BytesMut;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hf_av::{Frame, MaterializeJob};
use hf_core::config::LiveConfig;
use hf_core::{Error, Resolution, Result};

use crate::ingest::{ChunkStatus, IngestPipeline, IngestReport, RenditionResult};

/// Result of one buffer flush.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChunkOutcome {
    Ingested(IngestReport),
    /// The buffer could not be turned into a chunk, or every rendition of
    /// the chunk failed. Either way its frames are gone.
    Dropped { frames: usize, error: String },
}

/// The live frame buffer.
pub struct LiveCapture {
    pipeline: IngestPipeline,
    config: LiveConfig,
    source_kbps: Option<u32>,
    buffer: Vec<Frame>,
    geometry: Option<Resolution>,
}

impl LiveCapture {
    pub fn new(pipeline: IngestPipeline, config: LiveConfig, source_kbps: Option<u32>) -> Self {
        let capacity = config.frames_per_chunk().min(4096);
        Self {
            pipeline,
            config,
            source_kbps,
            buffer: Vec::with_capacity(capacity),
            geometry: None,
        }
    }

    /// Frames currently waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn threshold(&self) -> usize {
        self.config.frames_per_chunk().max(1)
    }

    /// Buffer one frame, flushing if the chunk is now full.
    ///
    /// A frame whose size differs from the frames already buffered is
    /// rejected with [`Error::Validation`] and not buffered.
    pub async fn push_frame(
        &mut self,
        frame: Frame,
        cancel: &CancellationToken,
    ) -> Result<Option<ChunkOutcome>> {
        let resolution = frame.resolution();
        match self.geometry {
            Some(expected) if expected != resolution => {
                return Err(Error::Validation(format!(
                    "frame is {resolution}, buffer holds {expected}"
                )));
            }
            Some(_) => {}
            None => self.geometry = Some(resolution),
        }

        self.buffer.push(frame);
        if self.buffer.len() >= self.threshold() {
            Ok(Some(self.flush(cancel).await))
        } else {
            Ok(None)
        }
    }

    /// Flush a trailing partial chunk, if any frames are buffered.
    pub async fn finish(&mut self, cancel: &CancellationToken) -> Option<ChunkOutcome> {
        if self.buffer.is_empty() {
            return None;
        }
        tracing::info!(frames = self.buffer.len(), "Flushing trailing partial chunk");
        Some(self.flush(cancel).await)
    }

    async fn flush(&mut self, cancel: &CancellationToken) -> ChunkOutcome {
        let frames = std::mem::take(&mut self.buffer);
        self.geometry = None;

        let error = match self.materialize_and_ingest(&frames, cancel).await {
            Ok(report) if report.status() == ChunkStatus::Failed => rendition_errors(&report),
            Ok(report) => return ChunkOutcome::Ingested(report),
            Err(e) => e.to_string(),
        };

        self.pipeline.stats().record_dropped();
        tracing::warn!(frames = frames.len(), error = %error, "Live chunk dropped");
        ChunkOutcome::Dropped {
            frames: frames.len(),
            error,
        }
    }

    async fn materialize_and_ingest(
        &self,
        frames: &[Frame],
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        std::fs::create_dir_all(&self.config.work_dir)?;
        // Removed on drop, whatever happens below.
        let intermediate = tempfile::Builder::new()
            .prefix("live-")
            .suffix(".mp4")
            .tempfile_in(&self.config.work_dir)?;

        let job = MaterializeJob {
            frames,
            fps: self.config.fps,
            codec: self.config.intermediate_codec.clone(),
            output: intermediate.path().to_path_buf(),
        };
        self.pipeline
            .encoder()
            .materialize_frames(&job, cancel)
            .await?;

        Ok(self
            .pipeline
            .ingest_chunk(intermediate.path(), self.source_kbps, cancel)
            .await)
    }
}

fn rendition_errors(report: &IngestReport) -> String {
    let errors: Vec<String> = report
        .renditions
        .iter()
        .filter_map(|r| match &r.result {
            RenditionResult::Failed { error, .. } => Some(format!("{}: {error}", r.rendition)),
            _ => None,
        })
        .collect();
    if errors.is_empty() {
        "no rendition transcoded".to_string()
    } else {
        errors.join("; ")
    }
}

/// Decodes a video file into BGR24 [`Frame`]s via an ffmpeg child process.
#[derive(Debug, Clone)]
pub struct RawFrameSource {
    ffmpeg: PathBuf,
    input: PathBuf,
    resolution: Resolution,
    fps: u32,
    realtime: bool,
}

impl RawFrameSource {
    pub fn new(ffmpeg: PathBuf, input: PathBuf, resolution: Resolution, fps: u32) -> Self {
        Self {
            ffmpeg,
            input,
            resolution,
            fps,
            realtime: false,
        }
    }

    /// Read the input at its native frame rate (`-re`), like a camera would.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
        if self.realtime {
            args.push("-re".into());
        }
        args.push("-i".into());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(
            [
                "-an",
                "-vf",
                &format!("scale={}:{}", self.resolution.width, self.resolution.height),
                "-r",
                &self.fps.to_string(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "bgr24",
                "-",
            ]
            .map(String::from),
        );
        args
    }

    /// Start decoding. Frames arrive on the returned channel; the handle
    /// resolves to the number of frames delivered once the input ends, the
    /// receiver is dropped, or `cancel` fires. A decoder that exits non-zero
    /// on its own resolves to [`Error::Tool`] carrying its stderr.
    pub fn spawn(
        self,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<Frame>, JoinHandle<Result<u64>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move { self.pump(tx, cancel).await });
        (rx, handle)
    }

    async fn pump(self, tx: mpsc::Sender<Frame>, cancel: CancellationToken) -> Result<u64> {
        let mut child = Command::new(&self.ffmpeg)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::tool("ffmpeg", format!("failed to spawn: {e}")))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("ffmpeg stdout not captured".into()))?;
        // Drained concurrently so a noisy decoder never blocks on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        let frame_len = Frame::byte_len(self.resolution.width, self.resolution.height);
        let mut delivered = 0u64;
        let mut stopped = false;

        loop {
            let mut buf = BytesMut::zeroed(frame_len);
            let read = tokio::select! {
                r = stdout.read_exact(&mut buf) => r,
                _ = cancel.cancelled() => {
                    stopped = true;
                    break;
                }
            };
            match read {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let frame = Frame::new(self.resolution.width, self.resolution.height, buf.freeze())?;
            if tx.send(frame).await.is_err() {
                tracing::debug!("Frame receiver dropped; stopping decoder");
                stopped = true;
                break;
            }
            delivered += 1;
        }

        if stopped {
            let _ = child.start_kill();
            let _ = child.wait().await;
        } else {
            let status = child.wait().await?;
            if !status.success() && !cancel.is_cancelled() {
                let stderr = match stderr {
                    Some(task) => task.await.unwrap_or_default(),
                    None => String::new(),
                };
                return Err(Error::tool(
                    "ffmpeg",
                    format!("exited with status {status}: {}", stderr.trim()),
                ));
            }
        }

        tracing::info!(frames = delivered, "Raw frame source finished");
        Ok(delivered)
    }
}

/// Totals from one [`run_live`] session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveSummary {
    pub frames_received: u64,
    pub frames_rejected: u64,
    pub chunks_ingested: u64,
    pub chunks_dropped: u64,
    /// Frames left in the buffer when the stop signal fired.
    pub frames_discarded: usize,
}

impl LiveSummary {
    fn note(&mut self, outcome: &ChunkOutcome) {
        match outcome {
            ChunkOutcome::Ingested(_) => self.chunks_ingested += 1,
            ChunkOutcome::Dropped { .. } => self.chunks_dropped += 1,
        }
    }
}

/// Feed frames from `frames` into `capture` until the producer finishes or
/// `cancel` fires.
///
/// When the producer ends normally the trailing partial buffer is flushed.
/// After cancellation no new chunk is started and buffered frames are
/// discarded.
pub async fn run_live(
    mut frames: mpsc::Receiver<Frame>,
    capture: &mut LiveCapture,
    cancel: &CancellationToken,
) -> LiveSummary {
    let mut summary = LiveSummary::default();

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = frames.recv() => frame,
        };
        let Some(frame) = frame else {
            break;
        };
        summary.frames_received += 1;

        match capture.push_frame(frame, cancel).await {
            Ok(Some(outcome)) => summary.note(&outcome),
            Ok(None) => {}
            Err(e) => {
                summary.frames_rejected += 1;
                tracing::warn!(error = %e, "Rejected frame");
            }
        }
    }

    if cancel.is_cancelled() {
        summary.frames_discarded = capture.buffered();
        if summary.frames_discarded > 0 {
            tracing::info!(frames = summary.frames_discarded, "Stop requested; discarding buffer");
        }
    } else if let Some(outcome) = capture.finish(cancel).await {
        summary.note(&outcome);
    }

    tracing::info!(
        frames = summary.frames_received,
        ingested = summary.chunks_ingested,
        dropped = summary.chunks_dropped,
        "Live capture finished"
    );
    summary
}
