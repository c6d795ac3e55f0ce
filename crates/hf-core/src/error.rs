//! Unified error type for hlsforge.
//!
//! Every crate funnels its failures into [`Error`]. The ingestion pipeline
//! never lets one of these escape to the process: it records them per
//! rendition or per chunk and keeps going.

use std::fmt;
use std::path::Path;

/// Unified error type covering all failure modes in hlsforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) could not be run or exited non-zero.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed or returned something unparseable.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Transcoding one chunk into one rendition failed.
    #[error("Transcode error [{rendition}]: {message}")]
    Transcode {
        /// Rendition name (e.g. "low").
        rendition: String,
        /// Human-readable error description.
        message: String,
    },

    /// A playlist could not be written. The previous playlist stays in place.
    #[error("Playlist write error [{path}]: {message}")]
    PlaylistWrite {
        /// Target playlist path.
        path: String,
        /// Human-readable error description.
        message: String,
    },

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation was stopped by a cancellation signal.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Probe(_) => 422,
            Error::Transcode { .. } => 502,
            Error::PlaylistWrite { .. } => 500,
            Error::Validation(_) => 400,
            Error::Cancelled(_) => 503,
            Error::Internal(_) => 500,
        }
    }

    /// Whether this error came from a cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Transcode`].
    pub fn transcode(rendition: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Transcode {
            rendition: rendition.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::PlaylistWrite`].
    pub fn playlist_write(path: &Path, message: impl fmt::Display) -> Self {
        Error::PlaylistWrite {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn transcode_display() {
        let err = Error::transcode("low", "no segments produced");
        assert_eq!(err.to_string(), "Transcode error [low]: no segments produced");
    }

    #[test]
    fn playlist_write_display() {
        let err = Error::playlist_write(Path::new("/out/low/low.m3u8"), "disk full");
        assert_eq!(
            err.to_string(),
            "Playlist write error [/out/low/low.m3u8]: disk full"
        );
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn probe_display() {
        let err = Error::Probe("missing bit_rate".into());
        assert_eq!(err.to_string(), "Probe error: missing bit_rate");
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn cancelled_is_flagged() {
        let err = Error::Cancelled("stop requested".into());
        assert!(err.is_cancelled());
        assert!(!Error::Internal("boom".into()).is_cancelled());
    }
}
