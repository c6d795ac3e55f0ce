//! Shared application context handed to every route handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use hf_av::ToolRegistry;
use hf_core::config::Config;
use hf_media::SegmentIndexTracker;
use hf_pipeline::{IngestPipeline, IngestStats};

/// Cheap-to-clone handle on everything the HTTP layer reads.
///
/// The tracker and statistics are the same instances the ingestion pipeline
/// updates, so `/api/status` reflects live progress.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub tracker: Arc<SegmentIndexTracker>,
    pub stats: Arc<IngestStats>,
    pub tools: Arc<ToolRegistry>,
    pub started_at: DateTime<Utc>,
}

impl AppContext {
    /// Context sharing state with a running pipeline.
    pub fn with_pipeline(config: Config, pipeline: &IngestPipeline, tools: Arc<ToolRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            tracker: pipeline.tracker().clone(),
            stats: pipeline.stats().clone(),
            tools,
            started_at: Utc::now(),
        }
    }

    /// Context for serving an existing output tree with no ingestion running.
    pub fn standalone(config: Config, tools: Arc<ToolRegistry>) -> Self {
        let tracker = Arc::new(SegmentIndexTracker::new(config.output.root.clone()));
        Self {
            config: Arc::new(config),
            tracker,
            stats: Arc::new(IngestStats::default()),
            tools,
            started_at: Utc::now(),
        }
    }
}
