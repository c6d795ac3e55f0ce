//! Media-domain value types shared across crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A frame size in pixels.
///
/// Serialized as the `"<W>x<H>"` string used on `RESOLUTION=` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count, used to order renditions.
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::Validation(format!("resolution '{s}' is not <W>x<H>")))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::Validation(format!("resolution width '{w}': {e}")))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::Validation(format!("resolution height '{h}': {e}")))?;
        if width == 0 || height == 0 {
            return Err(Error::Validation(format!("resolution '{s}' has a zero side")));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// How media playlists are finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    /// `#EXT-X-PLAYLIST-TYPE:VOD` plus `#EXT-X-ENDLIST` on every rewrite.
    #[default]
    Vod,
    /// `#EXT-X-PLAYLIST-TYPE:EVENT` and no end marker, so players keep polling.
    Event,
}

impl PlaylistKind {
    /// Value of the `#EXT-X-PLAYLIST-TYPE` tag.
    pub fn tag_value(self) -> &'static str {
        match self {
            PlaylistKind::Vod => "VOD",
            PlaylistKind::Event => "EVENT",
        }
    }

    /// Whether the playlist carries `#EXT-X-ENDLIST`.
    pub fn has_end_marker(self) -> bool {
        matches!(self, PlaylistKind::Vod)
    }
}
