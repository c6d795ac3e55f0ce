//! # hf-av
//!
//! External tool management, probing, and encoding for the hlsforge
//! pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   chunked stdin and cancellation support for running external processes.
//! - **Probing** ([`Prober`], [`FfprobeProber`]) -- bitrate, frame count and
//!   geometry of a video stream, with failures collapsing to "unknown".
//! - **Encoding** ([`Encoder`], [`FfmpegEncoder`]) -- the narrow seam the
//!   ingestion pipeline drives: rendition transcodes, raw frame
//!   materialization, and source preparation.

pub mod command;
pub mod encoder;
pub mod ffmpeg;
pub mod frame;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encoder::{list_chunks, CompressJob, Encoder, MaterializeJob, RenditionJob, SplitJob};
pub use ffmpeg::FfmpegEncoder;
pub use frame::Frame;
pub use probe::{probe_bitrate_kbps, probe_frame_count, FfprobeProber, Prober, VideoStreamInfo};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
