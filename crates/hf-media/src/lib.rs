//! # hf-media
//!
//! The HLS output model for hlsforge: which renditions exist, how their
//! segments are named on disk, how playlists are rendered and written, and
//! which sequence number each rendition continues from.
//!
//! - [`ladder`] -- source bitrate to rendition ladder policy.
//! - [`layout`] -- segment naming convention and output directory layout.
//! - [`hls`] -- master and media playlist types and rendering.
//! - [`writer`] -- atomic playlist writers driven by on-disk state.
//! - [`tracker`] -- per-rendition segment sequence counters.

pub mod hls;
pub mod ladder;
pub mod layout;
pub mod tracker;
pub mod writer;

pub use ladder::{ladder_for, Rendition};
pub use layout::{clear_output, list_segments, SegmentFile};
pub use tracker::{CounterSnapshot, RenditionGuard, ReseedReport, SegmentIndexTracker};
pub use writer::{write_master_playlist, write_media_playlist, MediaPlaylistOutcome};
