//! Shared harness for pipeline integration tests.
//!
//! [`ScriptedEncoder`] stands in for ffmpeg: every rendition job writes a
//! fixed number of fake `.ts` files from the job's start index, and chosen
//! (rendition, call) pairs can be scripted to fail or be cancelled.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use hf_av::{CompressJob, Encoder, MaterializeJob, RenditionJob, SplitJob};
use hf_core::config::Config;
use hf_core::{Error, Result};
use hf_media::layout;
use hf_pipeline::{IngestPipeline, PipelineSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Write some segments then exit non-zero.
    Fail,
    /// Write some segments then report being killed.
    Cancel,
}

pub struct ScriptedEncoder {
    segments_per_job: u64,
    scripts: Mutex<HashMap<(String, usize), Script>>,
    calls: Mutex<HashMap<String, usize>>,
    jobs: Mutex<Vec<RenditionJob>>,
    fail_materialize: AtomicBool,
    materialized: Mutex<Vec<(PathBuf, usize)>>,
}

impl ScriptedEncoder {
    pub fn new(segments_per_job: u64) -> Self {
        Self {
            segments_per_job,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            jobs: Mutex::new(Vec::new()),
            fail_materialize: AtomicBool::new(false),
            materialized: Mutex::new(Vec::new()),
        }
    }

    /// Script the `call`-th (0-based) job for `rendition`.
    pub fn script(&self, rendition: &str, call: usize, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert((rendition.to_string(), call), script);
    }

    pub fn fail_materialize(&self, fail: bool) {
        self.fail_materialize.store(fail, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<RenditionJob> {
        self.jobs.lock().unwrap().clone()
    }

    /// Start indices handed to `rendition`, in call order.
    pub fn starts(&self, rendition: &str) -> Vec<u64> {
        self.jobs()
            .into_iter()
            .filter(|j| j.rendition == rendition)
            .map(|j| j.start_index)
            .collect()
    }

    /// (intermediate path, frame count) for every materialize call.
    pub fn materialized(&self) -> Vec<(PathBuf, usize)> {
        self.materialized.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn encode_rendition(&self, job: &RenditionJob, _cancel: &CancellationToken) -> Result<()> {
        assert!(job.input.exists(), "chunk {} missing", job.input.display());

        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(job.rendition.clone()).or_insert(0);
            let call = *n;
            *n += 1;
            call
        };
        self.jobs.lock().unwrap().push(job.clone());

        let dir = job.segment_pattern.parent().unwrap();
        for seq in job.start_index..job.start_index + self.segments_per_job {
            let name = layout::segment_file_name(&job.rendition, seq, "ts");
            std::fs::write(dir.join(name), format!("{} {seq}", job.rendition)).unwrap();
        }
        tokio::task::yield_now().await;

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&(job.rendition.clone(), call))
            .copied();
        match script {
            Some(Script::Fail) => Err(Error::tool("ffmpeg", "exited with status 1")),
            Some(Script::Cancel) => Err(Error::Cancelled("ffmpeg killed".into())),
            None => Ok(()),
        }
    }

    async fn materialize_frames(
        &self,
        job: &MaterializeJob<'_>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.materialized
            .lock()
            .unwrap()
            .push((job.output.clone(), job.frames.len()));
        if self.fail_materialize.load(Ordering::SeqCst) {
            return Err(Error::tool("ffmpeg", "rawvideo pipe broken"));
        }
        std::fs::write(&job.output, b"mp4")?;
        Ok(())
    }

    async fn compress_source(&self, _job: &CompressJob) -> Result<()> {
        Ok(())
    }

    async fn split_source(&self, _job: &SplitJob) -> Result<()> {
        Ok(())
    }
}

/// A pipeline over a temp output root plus the encoder driving it.
pub struct Harness {
    pub tmp: TempDir,
    pub encoder: Arc<ScriptedEncoder>,
    pub pipeline: IngestPipeline,
    pub config: Config,
}

impl Harness {
    pub fn new(segments_per_job: u64) -> Self {
        Self::with(segments_per_job, |_| {})
    }

    pub fn with(segments_per_job: u64, tweak: impl FnOnce(&mut Config)) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output.root = tmp.path().join("hls");
        config.live.work_dir = tmp.path().join("work");
        tweak(&mut config);

        let encoder = Arc::new(ScriptedEncoder::new(segments_per_job));
        let pipeline = IngestPipeline::new(encoder.clone(), PipelineSettings::from_config(&config));
        Self {
            tmp,
            encoder,
            pipeline,
            config,
        }
    }

    /// Same output root, fresh encoder and tracker: a process restart.
    pub fn restart(&self) -> IngestPipeline {
        IngestPipeline::new(
            Arc::new(ScriptedEncoder::new(self.encoder.segments_per_job)),
            PipelineSettings::from_config(&self.config),
        )
    }

    pub fn root(&self) -> &Path {
        &self.config.output.root
    }

    /// Create `count` fake chunk files and return their paths.
    pub fn chunks(&self, count: usize) -> Vec<PathBuf> {
        let dir = self.tmp.path().join("chunks");
        std::fs::create_dir_all(&dir).unwrap();
        (0..count)
            .map(|i| {
                let path = dir.join(format!("chunk_{i:04}.mp4"));
                std::fs::write(&path, b"chunk").unwrap();
                path
            })
            .collect()
    }

    pub fn sequences(&self, rendition: &str) -> Vec<u64> {
        let dir = layout::rendition_dir(self.root(), rendition);
        layout::list_segments(&dir, rendition)
            .unwrap()
            .into_iter()
            .map(|s| s.sequence)
            .collect()
    }

    pub fn media_playlist(&self, rendition: &str) -> Option<String> {
        std::fs::read_to_string(layout::media_playlist_path(self.root(), rendition)).ok()
    }

    pub fn master_playlist(&self) -> Option<String> {
        std::fs::read_to_string(layout::master_playlist_path(self.root())).ok()
    }
}

/// Segment URIs listed in a media playlist, in order.
pub fn playlist_uris(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .map(String::from)
        .collect()
}

pub fn unique<T: std::hash::Hash + Eq + Clone>(items: &[T]) -> bool {
    items.iter().cloned().collect::<HashSet<_>>().len() == items.len()
}
