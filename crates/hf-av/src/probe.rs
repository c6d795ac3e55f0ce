//! Video stream probing.
//!
//! The [`Prober`] trait is the seam; [`FfprobeProber`] shells out to
//! `ffprobe -of json` and maps the first video stream into a
//! [`VideoStreamInfo`]. Callers that only need one number use
//! [`probe_bitrate_kbps`] / [`probe_frame_count`], which turn every failure
//! into `None` ("unknown") after logging it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hf_core::Error;

use crate::command::ToolCommand;

/// What we know about the primary video stream of a file.
///
/// Every field is optional: containers routinely omit `bit_rate` or
/// `nb_frames` on the stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    /// Stream bitrate in kbps, falling back to the container bitrate.
    pub bitrate_kbps: Option<u32>,
    pub frame_count: Option<u64>,
}

/// A media prober capable of describing a file's video stream.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Probe the first video stream of `path`.
    async fn video_stream(&self, path: &Path) -> hf_core::Result<VideoStreamInfo>;
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn video_stream(&self, path: &Path) -> hf_core::Result<VideoStreamInfo> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(Duration::from_secs(60));
        cmd.args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,bit_rate,nb_frames:format=bit_rate",
            "-of",
            "json",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await?;
        parse_ffprobe_json(&output.stdout)
    }
}

/// Probe the video bitrate in kbps, or `None` if it cannot be determined.
pub async fn probe_bitrate_kbps(prober: &dyn Prober, path: &Path) -> Option<u32> {
    match prober.video_stream(path).await {
        Ok(info) => {
            if info.bitrate_kbps.is_none() {
                tracing::warn!(path = %path.display(), "Probe returned no bitrate");
            }
            info.bitrate_kbps
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Bitrate probe failed");
            None
        }
    }
}

/// Probe the number of video frames, or `None` if it cannot be determined.
pub async fn probe_frame_count(prober: &dyn Prober, path: &Path) -> Option<u64> {
    match prober.video_stream(path).await {
        Ok(info) => {
            if info.frame_count.is_none() {
                tracing::warn!(path = %path.display(), "Probe returned no frame count");
            }
            info.frame_count
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Frame count probe failed");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    bit_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse `ffprobe -of json` output into a [`VideoStreamInfo`].
///
/// Fails if the output is not JSON or contains no video stream.
pub fn parse_ffprobe_json(json: &str) -> hf_core::Result<VideoStreamInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| Error::Probe("no video stream".into()))?;

    let container_bitrate = output.format.and_then(|f| f.bit_rate);
    let bitrate_kbps = parse_bps_as_kbps(stream.bit_rate.as_deref())
        .or_else(|| parse_bps_as_kbps(container_bitrate.as_deref()));

    Ok(VideoStreamInfo {
        width: stream.width,
        height: stream.height,
        frame_rate: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
        bitrate_kbps,
        frame_count: stream.nb_frames.and_then(|s| s.trim().parse().ok()),
    })
}

/// Bits per second (as ffprobe prints it) to whole kbps.
fn parse_bps_as_kbps(value: Option<&str>) -> Option<u32> {
    let bps: u64 = value?.trim().parse().ok()?;
    u32::try_from(bps / 1000).ok()
}

/// Parse a rational frame rate like `"30000/1001"` or a plain number.
fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => s.trim().parse().ok(),
    }
}
