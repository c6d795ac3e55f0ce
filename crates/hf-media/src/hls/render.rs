//! M3U8 rendering for master and media playlists.

use std::fmt;

use super::types::{MasterPlaylist, MediaPlaylist};

/// HLS protocol version written to media playlists.
const HLS_VERSION: u32 = 3;

impl fmt::Display for MasterPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#EXTM3U")?;
        for variant in &self.variants {
            writeln!(
                f,
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
                variant.bandwidth, variant.resolution
            )?;
            writeln!(f, "{}", variant.uri)?;
        }
        Ok(())
    }
}

impl fmt::Display for MediaPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#EXTM3U")?;
        writeln!(f, "#EXT-X-VERSION:{HLS_VERSION}")?;
        writeln!(f, "#EXT-X-TARGETDURATION:{}", self.target_duration)?;
        writeln!(f, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence)?;
        writeln!(f, "#EXT-X-PLAYLIST-TYPE:{}", self.kind.tag_value())?;

        for segment in &self.segments {
            writeln!(f, "#EXTINF:{:.6},", segment.duration)?;
            writeln!(f, "{}", segment.uri)?;
        }

        if self.kind.has_end_marker() {
            f.write_str("#EXT-X-ENDLIST\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::types::{Segment, Variant};
    use hf_core::{PlaylistKind, Resolution};

    fn media(kind: PlaylistKind, count: usize) -> MediaPlaylist {
        MediaPlaylist {
            target_duration: 10,
            media_sequence: 0,
            kind,
            segments: (0..count)
                .map(|i| Segment {
                    duration: 10.0,
                    uri: format!("segment-low-{i:03}.ts"),
                })
                .collect(),
        }
    }

    #[test]
    fn media_playlist_exact_output() {
        let m3u8 = media(PlaylistKind::Vod, 2).to_string();
        assert_eq!(
            m3u8,
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:10\n\
             #EXT-X-MEDIA-SEQUENCE:0\n\
             #EXT-X-PLAYLIST-TYPE:VOD\n\
             #EXTINF:10.000000,\n\
             segment-low-000.ts\n\
             #EXTINF:10.000000,\n\
             segment-low-001.ts\n\
             #EXT-X-ENDLIST\n"
        );
    }

    #[test]
    fn event_playlist_has_no_endlist() {
        let m3u8 = media(PlaylistKind::Event, 1).to_string();
        assert!(m3u8.contains("#EXT-X-PLAYLIST-TYPE:EVENT\n"));
        assert!(!m3u8.contains("#EXT-X-ENDLIST"));
    }

    #[test]
    fn master_playlist_keeps_variant_order() {
        let playlist = MasterPlaylist {
            variants: vec![
                Variant {
                    bandwidth: 300000,
                    resolution: Resolution::new(640, 360),
                    uri: "low/low.m3u8".into(),
                },
                Variant {
                    bandwidth: 800000,
                    resolution: Resolution::new(1280, 720),
                    uri: "medium/medium.m3u8".into(),
                },
            ],
        };
        assert_eq!(
            playlist.to_string(),
            "#EXTM3U\n\
             #EXT-X-STREAM-INF:BANDWIDTH=300000,RESOLUTION=640x360\n\
             low/low.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=1280x720\n\
             medium/medium.m3u8\n"
        );
    }
}
