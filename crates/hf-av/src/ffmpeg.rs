//! [`Encoder`] implementation backed by the ffmpeg CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use hf_core::config::EncoderConfig;
use hf_core::Error;

use crate::command::ToolCommand;
use crate::encoder::{CompressJob, Encoder, MaterializeJob, RenditionJob, SplitJob};
use crate::tools::ToolRegistry;

/// Source preparation can take a while on long inputs.
const PREPARE_TIMEOUT: Duration = Duration::from_secs(86400);

/// Encoder that shells out to ffmpeg for every job.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: PathBuf, config: EncoderConfig) -> Self {
        Self { ffmpeg, config }
    }

    /// Build an encoder from the registry's ffmpeg.
    pub fn from_registry(tools: &ToolRegistry, config: EncoderConfig) -> hf_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.path.clone(), config))
    }

    fn command(&self, timeout: Duration) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.timeout(timeout);
        cmd.args(["-hide_banner", "-nostats", "-loglevel", "error"]);
        cmd
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn encode_rendition(
        &self,
        job: &RenditionJob,
        cancel: &CancellationToken,
    ) -> hf_core::Result<()> {
        // ffmpeg insists on writing a playlist; keep it away from the served one.
        let scratch = tempfile::tempdir()?;
        let scratch_playlist = scratch.path().join(format!("{}.m3u8", job.rendition));

        tracing::info!(
            rendition = %job.rendition,
            resolution = %job.resolution,
            bitrate_kbps = job.bitrate_kbps,
            start_index = job.start_index,
            "HLS transcode: {:?}",
            job.input
        );

        let mut cmd = self.command(Duration::from_secs(self.config.timeout_secs));
        cmd.args(rendition_args(job, &self.config, &scratch_playlist));
        cmd.execute_with_cancel(cancel).await?;
        Ok(())
    }

    async fn materialize_frames(
        &self,
        job: &MaterializeJob<'_>,
        cancel: &CancellationToken,
    ) -> hf_core::Result<()> {
        let first = job
            .frames
            .first()
            .ok_or_else(|| Error::Validation("cannot materialize an empty frame batch".into()))?;
        let resolution = first.resolution();
        if let Some(odd) = job.frames.iter().find(|f| f.resolution() != resolution) {
            return Err(Error::Validation(format!(
                "frame batch mixes {} and {}",
                resolution,
                odd.resolution()
            )));
        }

        tracing::debug!(
            frames = job.frames.len(),
            resolution = %resolution,
            "Materializing frames to {:?}",
            job.output
        );

        let mut cmd = self.command(Duration::from_secs(self.config.timeout_secs));
        cmd.args([
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgr24",
            "-s",
            &resolution.to_string(),
            "-r",
            &job.fps.to_string(),
            "-i",
            "-",
            "-c:v",
            &job.codec,
            "-q:v",
            "2",
            "-pix_fmt",
            "yuv420p",
        ]);
        cmd.arg(job.output.to_string_lossy().as_ref());
        cmd.stdin_chunks(job.frames.iter().map(|f| f.data().clone()).collect());
        cmd.execute_with_cancel(cancel).await?;
        Ok(())
    }

    async fn compress_source(&self, job: &CompressJob) -> hf_core::Result<()> {
        if let Some(parent) = job.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(
            "H.264 normalise: {:?} -> {:?} ({}, {})",
            job.input,
            job.output,
            job.resolution,
            job.bitrate
        );

        let mut cmd = self.command(PREPARE_TIMEOUT);
        cmd.args(compress_args(job));
        cmd.execute().await?;
        Ok(())
    }

    async fn split_source(&self, job: &SplitJob) -> hf_core::Result<()> {
        std::fs::create_dir_all(&job.chunk_dir)?;

        tracing::info!(
            "Splitting {:?} into {}s chunks in {:?}",
            job.input,
            job.chunk_seconds,
            job.chunk_dir
        );

        let mut cmd = self.command(PREPARE_TIMEOUT);
        cmd.args(split_args(job, &self.config));
        cmd.execute().await?;
        Ok(())
    }
}

/// Arguments for one closed-GOP HLS rendition transcode.
///
/// Keyframes are forced on every segment boundary and scene-cut keyframes
/// are disabled so each `.ts` segment decodes on its own.
pub fn rendition_args(job: &RenditionJob, cfg: &EncoderConfig, playlist: &Path) -> Vec<String> {
    let seg = job.segment_duration.max(1);
    let gop = cfg.gop_fps.max(1) * seg;
    let rate = format!("{}k", job.bitrate_kbps);

    let mut args: Vec<String> = vec!["-y".into(), "-i".into()];
    args.push(job.input.to_string_lossy().to_string());
    args.extend(
        [
            "-map", "0:v:0", "-an",
            "-c:v", &cfg.video_codec,
            "-preset", &cfg.preset,
            "-s", &job.resolution.to_string(),
            "-b:v", &rate,
            "-maxrate", &rate,
            "-bufsize", &cfg.bufsize,
            "-g", &gop.to_string(),
            "-keyint_min", &gop.to_string(),
            "-sc_threshold", "0",
            "-force_key_frames", &format!("expr:gte(t,n_forced*{seg})"),
            "-f", "hls",
            "-hls_time", &seg.to_string(),
            "-hls_playlist_type", "vod",
            "-hls_segment_type", "mpegts",
            "-start_number", &job.start_index.to_string(),
            "-hls_segment_filename",
        ]
        .map(String::from),
    );
    args.push(job.segment_pattern.to_string_lossy().to_string());
    args.push(playlist.to_string_lossy().to_string());
    args
}

fn compress_args(job: &CompressJob) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into()];
    args.push(job.input.to_string_lossy().to_string());
    args.extend(
        [
            "-vf", &format!("scale={}:{}", job.resolution.width, job.resolution.height),
            "-c:v", "libx264",
            "-b:v", &job.bitrate,
            "-maxrate", &job.bitrate,
            "-bufsize", &job.bufsize,
            "-preset", &job.preset,
            "-tune", &job.tune,
        ]
        .map(String::from),
    );
    args.push(job.output.to_string_lossy().to_string());
    args
}

fn split_args(job: &SplitJob, cfg: &EncoderConfig) -> Vec<String> {
    let seconds = job.chunk_seconds.max(1);
    let mut args: Vec<String> = vec!["-y".into(), "-i".into()];
    args.push(job.input.to_string_lossy().to_string());
    args.extend(["-an", "-c:v", &cfg.video_codec, "-preset", &cfg.preset].map(String::from));
    if let Some(kbps) = job.bitrate_kbps {
        let rate = format!("{kbps}k");
        args.extend(["-b:v", &rate, "-maxrate", &rate, "-bufsize", "3M"].map(String::from));
    }
    args.extend(
        [
            "-force_key_frames", &format!("expr:gte(t,n_forced*{seconds})"),
            "-f", "segment",
            "-segment_time", &seconds.to_string(),
            "-reset_timestamps", "1",
        ]
        .map(String::from),
    );
    args.push(job.chunk_dir.join("chunk_%04d.mp4").to_string_lossy().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::Resolution;

    fn job() -> RenditionJob {
        RenditionJob {
            input: PathBuf::from("/chunks/chunk_0000.mp4"),
            rendition: "medium".into(),
            resolution: Resolution::new(1280, 720),
            bitrate_kbps: 900,
            start_index: 6,
            segment_duration: 10,
            segment_pattern: PathBuf::from("/out/medium/segment-medium-%03d.ts"),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let pos = args.iter().position(|a| a == flag).unwrap();
        &args[pos + 1]
    }

    #[test]
    fn rendition_args_carry_the_contract() {
        let args = rendition_args(&job(), &EncoderConfig::default(), Path::new("/tmp/x.m3u8"));
        assert_eq!(value_after(&args, "-i"), "/chunks/chunk_0000.mp4");
        assert_eq!(value_after(&args, "-s"), "1280x720");
        assert_eq!(value_after(&args, "-b:v"), "900k");
        assert_eq!(value_after(&args, "-maxrate"), "900k");
        assert_eq!(value_after(&args, "-bufsize"), "2M");
        assert_eq!(value_after(&args, "-hls_time"), "10");
        assert_eq!(value_after(&args, "-start_number"), "6");
        assert_eq!(value_after(&args, "-g"), "300");
        assert_eq!(value_after(&args, "-force_key_frames"), "expr:gte(t,n_forced*10)");
        assert_eq!(
            value_after(&args, "-hls_segment_filename"),
            "/out/medium/segment-medium-%03d.ts"
        );
        assert_eq!(args.last().unwrap(), "/tmp/x.m3u8");
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn zero_segment_duration_is_clamped() {
        let mut j = job();
        j.segment_duration = 0;
        let args = rendition_args(&j, &EncoderConfig::default(), Path::new("p.m3u8"));
        assert_eq!(value_after(&args, "-hls_time"), "1");
    }

    #[test]
    fn compress_args_scale_and_cap() {
        let job = CompressJob {
            input: PathBuf::from("in.mp4"),
            output: PathBuf::from("h264_outputs/res.mp4"),
            resolution: Resolution::new(1920, 1080),
            bitrate: "3000k".into(),
            bufsize: "2M".into(),
            preset: "medium".into(),
            tune: "film".into(),
        };
        let args = compress_args(&job);
        assert_eq!(value_after(&args, "-vf"), "scale=1920:1080");
        assert_eq!(value_after(&args, "-b:v"), "3000k");
        assert_eq!(value_after(&args, "-tune"), "film");
        assert_eq!(args.last().unwrap(), "h264_outputs/res.mp4");
    }

    #[test]
    fn split_args_with_and_without_bitrate() {
        let mut job = SplitJob {
            input: PathBuf::from("res.mp4"),
            chunk_dir: PathBuf::from("chunks"),
            chunk_seconds: 30,
            bitrate_kbps: Some(3000),
        };
        let args = split_args(&job, &EncoderConfig::default());
        assert_eq!(value_after(&args, "-b:v"), "3000k");
        assert_eq!(value_after(&args, "-segment_time"), "30");
        assert!(args.last().unwrap().ends_with("chunk_%04d.mp4"));

        job.bitrate_kbps = None;
        let args = split_args(&job, &EncoderConfig::default());
        assert!(!args.contains(&"-b:v".to_string()));
    }

    #[tokio::test]
    async fn materialize_rejects_empty_batch() {
        let encoder = FfmpegEncoder::new(PathBuf::from("ffmpeg"), EncoderConfig::default());
        let job = MaterializeJob {
            frames: &[],
            fps: 30,
            codec: "mpeg4".into(),
            output: PathBuf::from("out.mp4"),
        };
        let err = encoder
            .materialize_frames(&job, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_tool_error() {
        let encoder = FfmpegEncoder::new(
            PathBuf::from("nonexistent_ffmpeg_xyz"),
            EncoderConfig::default(),
        );
        let err = encoder
            .encode_rendition(&job(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool { .. }));
    }
}
