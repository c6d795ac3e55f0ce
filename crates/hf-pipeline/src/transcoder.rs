//! Rendition transcoder: one chunk, one rendition, one encoder run.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use hf_av::{Encoder, RenditionJob};
use hf_core::{Error, Result};
use hf_media::layout;
use hf_media::Rendition;

/// Transcode `input` into `rendition`'s segments, numbering from `start_index`.
///
/// Returns the number of segment files now on disk with a sequence number of
/// at least `start_index`. The encoder's own exit status decides success; a
/// clean exit that left no segments is still a failure.
///
/// On failure or cancellation every segment at or above `start_index` is
/// removed, so a counter that was not advanced never points below leftover
/// files.
pub async fn transcode_rendition(
    encoder: &dyn Encoder,
    root: &Path,
    input: &Path,
    rendition: &Rendition,
    start_index: u64,
    segment_duration: u32,
    cancel: &CancellationToken,
) -> Result<u64> {
    let dir = layout::rendition_dir(root, &rendition.name);
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::transcode(&rendition.name, format!("creating {}: {e}", dir.display())))?;

    let job = RenditionJob {
        input: input.to_path_buf(),
        rendition: rendition.name.clone(),
        resolution: rendition.resolution,
        bitrate_kbps: rendition.bitrate_kbps,
        start_index,
        segment_duration,
        segment_pattern: layout::segment_pattern(root, &rendition.name),
    };

    let result = match encoder.encode_rendition(&job, cancel).await {
        Ok(()) => count_from(&dir, &rendition.name, start_index).and_then(|produced| {
            if produced == 0 {
                Err(Error::transcode(
                    &rendition.name,
                    format!("{} exited cleanly but wrote no segments", encoder.name()),
                ))
            } else {
                Ok(produced)
            }
        }),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e @ Error::Transcode { .. }) => Err(e),
        Err(e) => Err(Error::transcode(&rendition.name, e)),
    };

    if result.is_err() {
        remove_from(&dir, &rendition.name, start_index);
    }
    result
}

fn count_from(dir: &Path, rendition: &str, start_index: u64) -> Result<u64> {
    let segments = layout::list_segments(dir, rendition)
        .map_err(|e| Error::transcode(rendition, format!("listing {}: {e}", dir.display())))?;
    Ok(segments.iter().filter(|s| s.sequence >= start_index).count() as u64)
}

fn remove_from(dir: &Path, rendition: &str, start_index: u64) {
    let segments = match layout::list_segments(dir, rendition) {
        Ok(segments) => segments,
        Err(e) => {
            tracing::warn!(rendition, error = %e, "Could not list partial output for cleanup");
            return;
        }
    };

    for segment in segments.into_iter().filter(|s| s.sequence >= start_index) {
        match std::fs::remove_file(&segment.path) {
            Ok(()) => tracing::debug!(rendition, "Removed partial segment {}", segment.file_name),
            Err(e) => tracing::warn!(
                rendition,
                error = %e,
                "Failed to remove partial segment {}",
                segment.file_name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hf_av::{CompressJob, MaterializeJob, SplitJob};
    use hf_core::Resolution;

    /// Writes `segments` files from the job's start index, then returns `fail`.
    struct Scripted {
        segments: u64,
        fail: Option<fn() -> Error>,
    }

    #[async_trait]
    impl Encoder for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn encode_rendition(
            &self,
            job: &RenditionJob,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            let dir = job.segment_pattern.parent().unwrap();
            for seq in job.start_index..job.start_index + self.segments {
                let name = layout::segment_file_name(&job.rendition, seq, "ts");
                std::fs::write(dir.join(name), b"ts").unwrap();
            }
            match self.fail {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }

        async fn materialize_frames(
            &self,
            _job: &MaterializeJob<'_>,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            unimplemented!()
        }

        async fn compress_source(&self, _job: &CompressJob) -> Result<()> {
            unimplemented!()
        }

        async fn split_source(&self, _job: &SplitJob) -> Result<()> {
            unimplemented!()
        }
    }

    fn tool_failure() -> Error {
        Error::tool("ffmpeg", "exited with status 1")
    }

    fn killed() -> Error {
        Error::Cancelled("ffmpeg killed".into())
    }

    fn low() -> Rendition {
        Rendition {
            name: "low".into(),
            resolution: Resolution::new(640, 360),
            bitrate_kbps: 300,
        }
    }

    #[tokio::test]
    async fn counts_only_new_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("low");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("segment-low-000.ts"), b"old").unwrap();

        let encoder = Scripted { segments: 3, fail: None };
        let produced = transcode_rendition(
            &encoder,
            tmp.path(),
            Path::new("chunk.mp4"),
            &low(),
            1,
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(produced, 3);
    }

    #[tokio::test]
    async fn failure_removes_partial_output_only() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("low");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("segment-low-000.ts"), b"old").unwrap();

        let encoder = Scripted {
            segments: 2,
            fail: Some(tool_failure),
        };
        let err = transcode_rendition(
            &encoder,
            tmp.path(),
            Path::new("chunk.mp4"),
            &low(),
            1,
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Transcode { ref rendition, .. } if rendition == "low"));
        let left = layout::list_segments(&dir, "low").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].sequence, 0);
    }

    #[tokio::test]
    async fn cancellation_is_passed_through() {
        let tmp = tempfile::tempdir().unwrap();
        let encoder = Scripted {
            segments: 1,
            fail: Some(killed),
        };
        let err = transcode_rendition(
            &encoder,
            tmp.path(),
            Path::new("chunk.mp4"),
            &low(),
            0,
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
        assert!(layout::list_segments(&tmp.path().join("low"), "low")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn clean_exit_without_output_is_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let encoder = Scripted { segments: 0, fail: None };
        let err = transcode_rendition(
            &encoder,
            tmp.path(),
            Path::new("chunk.mp4"),
            &low(),
            0,
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("wrote no segments"));
    }
}
