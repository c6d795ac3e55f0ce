//! HLS playlist types.

use serde::{Deserialize, Serialize};

use hf_core::{PlaylistKind, Resolution};

/// A stream variant in a master playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Declared peak bandwidth in bits per second.
    pub bandwidth: u64,
    pub resolution: Resolution,
    /// Media playlist URI relative to the master playlist.
    pub uri: String,
}

/// A single segment in a media playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment duration in seconds.
    pub duration: f64,
    /// URI relative to the media playlist.
    pub uri: String,
}

/// An HLS master playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterPlaylist {
    /// Variants in ladder order.
    pub variants: Vec<Variant>,
}

/// An HLS media playlist for one rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPlaylist {
    pub target_duration: u32,
    pub media_sequence: u64,
    pub kind: PlaylistKind,
    pub segments: Vec<Segment>,
}
