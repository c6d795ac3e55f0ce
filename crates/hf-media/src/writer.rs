//! Playlist writers.
//!
//! Both writers derive their output from disk state and the static ladder
//! table only, never from the tracker's counters. Files are replaced
//! atomically (temp file in the same directory, then rename) so an HTTP
//! reader always sees either the old or the new complete playlist. A
//! rewrite keeps the mode of the playlist it replaces; a new playlist is
//! world-readable like the segments beside it.

use std::fs::Permissions;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use hf_core::config::DeclaredVariant;
use hf_core::{Error, PlaylistKind, Result};

use crate::hls::{MasterPlaylist, MediaPlaylist, Segment, Variant};
use crate::layout;

/// Result of a media playlist rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPlaylistOutcome {
    /// Playlist written listing this many segments.
    Written { segments: usize },
    /// No segments on disk; nothing was written.
    Skipped,
}

/// Regenerate `<root>/<rendition>/<rendition>.m3u8` from the segments on disk.
///
/// Every segment gets `target_duration` as its `#EXTINF` value. If the
/// rendition has no segments (or no directory), the existing playlist, if
/// any, is left untouched and [`MediaPlaylistOutcome::Skipped`] is returned.
pub fn write_media_playlist(
    root: &Path,
    rendition: &str,
    target_duration: u32,
    kind: PlaylistKind,
) -> Result<MediaPlaylistOutcome> {
    let dir = layout::rendition_dir(root, rendition);
    let path = layout::media_playlist_path(root, rendition);

    let segments = match layout::list_segments(&dir, rendition) {
        Ok(segments) => segments,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(Error::playlist_write(&path, format!("listing {}: {e}", dir.display()))),
    };

    if segments.is_empty() {
        tracing::debug!(rendition, "No segments yet; media playlist not written");
        return Ok(MediaPlaylistOutcome::Skipped);
    }

    let playlist = MediaPlaylist {
        target_duration,
        media_sequence: 0,
        kind,
        segments: segments
            .into_iter()
            .map(|s| Segment {
                duration: f64::from(target_duration),
                uri: s.file_name,
            })
            .collect(),
    };
    let count = playlist.segments.len();

    write_atomic(&path, playlist.to_string().as_bytes())?;
    tracing::debug!(rendition, segments = count, "Wrote {}", path.display());
    Ok(MediaPlaylistOutcome::Written { segments: count })
}

/// Write `<root>/master.m3u8` from the declared ladder table, in table order.
///
/// Creates the output root if needed. Always replaces the previous file.
pub fn write_master_playlist(root: &Path, declared: &[DeclaredVariant]) -> Result<()> {
    let path = layout::master_playlist_path(root);

    let playlist = MasterPlaylist {
        variants: declared
            .iter()
            .map(|v| Variant {
                bandwidth: v.bandwidth,
                resolution: v.resolution,
                uri: layout::media_playlist_uri(&v.name),
            })
            .collect(),
    };

    std::fs::create_dir_all(root).map_err(|e| Error::playlist_write(&path, e))?;
    write_atomic(&path, playlist.to_string().as_bytes())?;
    tracing::debug!(variants = declared.len(), "Wrote {}", path.display());
    Ok(())
}

/// Replace `path` with `contents` via a sibling temp file and rename.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::playlist_write(path, "path has no parent directory"))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| Error::playlist_write(path, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::playlist_write(path, e))?;
    if let Some(permissions) = target_permissions(path) {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::playlist_write(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| Error::playlist_write(path, e.error))?;
    Ok(())
}

/// Permissions for the file about to land at `path`: the current target's,
/// or 0644 for a new file. Temp files start out owner-only.
fn target_permissions(path: &Path) -> Option<Permissions> {
    if let Ok(meta) = std::fs::metadata(path) {
        return Some(meta.permissions());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(Permissions::from_mode(0o644))
    }
    #[cfg(not(unix))]
    {
        None
    }
}
