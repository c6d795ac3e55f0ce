//! Output tree layout and the segment naming convention.
//!
//! ```text
//! <root>/master.m3u8
//! <root>/<rendition>/<rendition>.m3u8
//! <root>/<rendition>/segment-<rendition>-NNN.ts
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// File name of the master playlist inside the output root.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Extension of HLS transport-stream segments.
pub const SEGMENT_EXT: &str = "ts";

/// Extensions recognised as segments (`.mp4` for the non-HLS intermediate case).
const SEGMENT_EXTS: &[&str] = &["ts", "mp4"];

/// A segment file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub sequence: u64,
    pub file_name: String,
    pub path: PathBuf,
}

pub fn rendition_dir(root: &Path, rendition: &str) -> PathBuf {
    root.join(rendition)
}

pub fn media_playlist_path(root: &Path, rendition: &str) -> PathBuf {
    rendition_dir(root, rendition).join(format!("{rendition}.m3u8"))
}

/// Media playlist path relative to the output root, as referenced by the
/// master playlist.
pub fn media_playlist_uri(rendition: &str) -> String {
    format!("{rendition}/{rendition}.m3u8")
}

pub fn master_playlist_path(root: &Path) -> PathBuf {
    root.join(MASTER_PLAYLIST)
}

/// `segment-<rendition>-<NNN>.<ext>`, with the sequence zero-padded to 3 digits.
pub fn segment_file_name(rendition: &str, sequence: u64, ext: &str) -> String {
    format!("segment-{rendition}-{sequence:03}.{ext}")
}

/// printf-style pattern handed to the encoder for a rendition's segments.
pub fn segment_pattern(root: &Path, rendition: &str) -> PathBuf {
    rendition_dir(root, rendition).join(format!("segment-{rendition}-%03d.{SEGMENT_EXT}"))
}

/// Parse the sequence number out of a segment file name for `rendition`.
///
/// Returns `None` for anything that does not follow the convention, including
/// other renditions' segments and unpadded numbers.
pub fn parse_segment_sequence(rendition: &str, file_name: &str) -> Option<u64> {
    let rest = file_name
        .strip_prefix("segment-")?
        .strip_prefix(rendition)?
        .strip_prefix('-')?;
    let (digits, ext) = rest.split_once('.')?;
    if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !SEGMENT_EXTS.contains(&ext) {
        return None;
    }
    digits.parse().ok()
}

/// List every segment of `rendition` in `dir`, in ascending sequence order.
///
/// Ties (the same number under two extensions) are broken by file name.
pub fn list_segments(dir: &Path, rendition: &str) -> io::Result<Vec<SegmentFile>> {
    let mut segments = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(sequence) = parse_segment_sequence(rendition, &file_name) else {
            continue;
        };
        if !entry.file_type()?.is_file() {
            continue;
        }
        segments.push(SegmentFile {
            sequence,
            file_name,
            path: entry.path(),
        });
    }
    segments.sort_by(|a, b| {
        a.sequence
            .cmp(&b.sequence)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    Ok(segments)
}

/// Remove the whole output tree. Returns `false` if there was nothing to remove.
pub fn clear_output(root: &Path) -> io::Result<bool> {
    match std::fs::remove_dir_all(root) {
        Ok(()) => {
            tracing::info!("Removed HLS output at {}", root.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_paths() {
        let root = Path::new("/srv/hls");
        assert_eq!(segment_file_name("low", 7, "ts"), "segment-low-007.ts");
        assert_eq!(segment_file_name("low", 1234, "ts"), "segment-low-1234.ts");
        assert_eq!(
            media_playlist_path(root, "medium"),
            PathBuf::from("/srv/hls/medium/medium.m3u8")
        );
        assert_eq!(media_playlist_uri("high"), "high/high.m3u8");
        assert_eq!(master_playlist_path(root), PathBuf::from("/srv/hls/master.m3u8"));
        assert_eq!(
            segment_pattern(root, "low"),
            PathBuf::from("/srv/hls/low/segment-low-%03d.ts")
        );
    }

    #[test]
    fn parses_only_matching_names() {
        assert_eq!(parse_segment_sequence("low", "segment-low-000.ts"), Some(0));
        assert_eq!(parse_segment_sequence("low", "segment-low-042.mp4"), Some(42));
        assert_eq!(parse_segment_sequence("low", "segment-low-1000.ts"), Some(1000));
        assert_eq!(parse_segment_sequence("low", "segment-medium-001.ts"), None);
        assert_eq!(parse_segment_sequence("low", "segment-low-01.ts"), None);
        assert_eq!(parse_segment_sequence("low", "segment-low-abc.ts"), None);
        assert_eq!(parse_segment_sequence("low", "segment-low-001.m3u8"), None);
        assert_eq!(parse_segment_sequence("low", "low.m3u8"), None);
    }

    #[test]
    fn list_segments_orders_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "segment-low-1000.ts",
            "segment-low-002.ts",
            "segment-low-000.ts",
            "segment-low-001.ts",
            "segment-medium-003.ts",
            "low.m3u8",
        ] {
            std::fs::write(dir.path().join(name), b"ts").unwrap();
        }

        let names: Vec<String> = list_segments(dir.path(), "low")
            .unwrap()
            .into_iter()
            .map(|s| s.file_name)
            .collect();
        assert_eq!(
            names,
            vec![
                "segment-low-000.ts",
                "segment-low-001.ts",
                "segment-low-002.ts",
                "segment-low-1000.ts"
            ]
        );
    }

    #[test]
    fn clear_output_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("hls");
        std::fs::create_dir_all(root.join("low")).unwrap();
        std::fs::write(root.join("low/segment-low-000.ts"), b"x").unwrap();

        assert!(clear_output(&root).unwrap());
        assert!(!root.exists());
        assert!(!clear_output(&root).unwrap());
    }
}
