//! # hf-pipeline
//!
//! Segment ingestion for hlsforge.
//!
//! Each incoming chunk, whether a file on disk or a flushed buffer of live
//! frames, is pushed through the whole rendition ladder:
//!
//! ```text
//! for each rendition:
//!     lock counter -> transcode -> advance -> rewrite media playlist
//!                  \-> on failure: clean partial output, log, continue
//! rewrite master playlist
//! ```
//!
//! - [`transcoder`] runs one (chunk, rendition) transcode and counts output.
//! - [`ingest`] is the per-chunk state machine.
//! - [`batch`] ingests a directory of pre-cut chunks.
//! - [`live`] buffers raw frames into chunks and feeds the pipeline.

pub mod batch;
pub mod ingest;
pub mod live;
pub mod stats;
pub mod transcoder;

pub use batch::{ingest_directory, BatchReport};
pub use ingest::{
    ChunkStatus, IngestPipeline, IngestReport, PipelineSettings, PlaylistStatus, RenditionOutcome,
    RenditionResult,
};
pub use live::{run_live, ChunkOutcome, LiveCapture, LiveSummary, RawFrameSource};
pub use stats::{IngestStats, StatsSnapshot};
pub use transcoder::transcode_rendition;
