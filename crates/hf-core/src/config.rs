//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, tools, output layout, ladder, encoder, live
//! capture and source preparation. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::media::{PlaylistKind, Resolution};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub output: OutputConfig,
    pub ladder: LadderConfig,
    pub encoder: EncoderConfig,
    pub live: LiveConfig,
    pub prepare: PrepareConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path.
    ///
    /// Unlike [`Config::load_or_default`] this fails on a missing or
    /// malformed file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.output.segment_duration == 0 {
            warnings.push("output.segment_duration is 0; ffmpeg will pick its own".into());
        }

        if self.ladder.resolutions.is_empty() {
            warnings.push("ladder.resolutions is empty; nothing will be transcoded".into());
        }

        if self.ladder.resolutions.len() > TIER_NAMES.len() {
            warnings.push(format!(
                "ladder.resolutions has {} entries; only the first {} are used",
                self.ladder.resolutions.len(),
                TIER_NAMES.len()
            ));
        }

        for pair in self.ladder.resolutions.windows(2) {
            if pair[1].pixels() <= pair[0].pixels() {
                warnings.push(format!(
                    "ladder.resolutions must ascend; {} follows {}",
                    pair[1], pair[0]
                ));
            }
        }

        for pair in self.ladder.declared.windows(2) {
            if pair[1].bandwidth <= pair[0].bandwidth {
                warnings.push(format!(
                    "ladder.declared '{}' does not increase bandwidth over '{}'",
                    pair[1].name, pair[0].name
                ));
            }
        }

        if self.live.fps == 0 || self.live.chunk_seconds == 0 {
            warnings.push("live.fps and live.chunk_seconds must be non-zero".into());
        }

        warnings
    }
}

/// Rendition names in ladder order, lowest first.
pub const TIER_NAMES: [&str; 3] = ["low", "medium", "high"];

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Layout of the generated HLS tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding `master.m3u8` and one subdirectory per rendition.
    pub root: PathBuf,
    /// Nominal segment duration in seconds (also `#EXT-X-TARGETDURATION`).
    pub segment_duration: u32,
    /// Whether media playlists are written as finished VOD or open EVENT.
    pub playlist_kind: PlaylistKind,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("segments/hls_file"),
            segment_duration: 10,
            playlist_kind: PlaylistKind::Vod,
        }
    }
}

/// One master playlist entry: what we advertise for a rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredVariant {
    pub name: String,
    /// Advertised peak bandwidth in bits per second.
    pub bandwidth: u64,
    pub resolution: Resolution,
}

impl DeclaredVariant {
    pub fn new(name: &str, bandwidth: u64, resolution: Resolution) -> Self {
        Self {
            name: name.to_string(),
            bandwidth,
            resolution,
        }
    }
}

/// Rendition ladder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    /// Target resolutions, ascending; paired with low / medium / high.
    pub resolutions: Vec<Resolution>,
    /// Fixed table written to the master playlist, in canonical order.
    pub declared: Vec<DeclaredVariant>,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            resolutions: vec![
                Resolution::new(640, 360),
                Resolution::new(1280, 720),
                Resolution::new(1920, 1080),
            ],
            declared: vec![
                DeclaredVariant::new("low", 300_000, Resolution::new(640, 360)),
                DeclaredVariant::new("medium", 800_000, Resolution::new(1280, 720)),
                DeclaredVariant::new("high", 1_500_000, Resolution::new(1920, 1080)),
            ],
        }
    }
}

/// Rendition encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub video_codec: String,
    pub preset: String,
    /// Rate-control buffer size passed to `-bufsize`.
    pub bufsize: String,
    /// Frame rate assumed when sizing the GOP (`gop_fps * segment_duration`).
    pub gop_fps: u32,
    /// Maximum wall-clock time for a single encoder invocation.
    pub timeout_secs: u64,
    /// Run the renditions of one chunk concurrently.
    pub parallel_renditions: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".into(),
            preset: "fast".into(),
            bufsize: "2M".into(),
            gop_fps: 30,
            timeout_secs: 1800,
            parallel_renditions: false,
        }
    }
}

/// Live capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub fps: u32,
    /// Seconds of frames accumulated before a chunk is flushed.
    pub chunk_seconds: u32,
    /// Directory for intermediate chunk containers.
    pub work_dir: PathBuf,
    /// Codec used for the intermediate container.
    pub intermediate_codec: String,
    /// Capacity of the frame channel between producer and buffer.
    pub channel_capacity: usize,
}

impl LiveConfig {
    /// Number of frames that make up one chunk.
    pub fn frames_per_chunk(&self) -> usize {
        (self.fps as usize).saturating_mul(self.chunk_seconds as usize)
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            chunk_seconds: 30,
            work_dir: PathBuf::from("segments/segmented_video"),
            intermediate_codec: "mpeg4".into(),
            channel_capacity: 64,
        }
    }
}

/// Source preparation (normalise + split into chunks) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    pub normalized_path: PathBuf,
    pub bitrate: String,
    pub bufsize: String,
    pub preset: String,
    pub tune: String,
    pub chunk_seconds: u32,
    pub chunk_dir: PathBuf,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            normalized_path: PathBuf::from("h264_outputs/res.mp4"),
            bitrate: "3000k".into(),
            bufsize: "2M".into(),
            preset: "medium".into(),
            tune: "film".into(),
            chunk_seconds: 30,
            chunk_dir: PathBuf::from("segments/segmented_video"),
        }
    }
}
