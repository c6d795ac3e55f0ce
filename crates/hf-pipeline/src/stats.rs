//! Ingestion counters shared between the pipeline and the status endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::ingest::{ChunkStatus, IngestReport};

#[derive(Debug, Default)]
pub struct IngestStats {
    chunks_complete: AtomicU64,
    chunks_partial: AtomicU64,
    chunks_failed: AtomicU64,
    chunks_cancelled: AtomicU64,
    chunks_dropped: AtomicU64,
    segments_produced: AtomicU64,
    last_ingest_at: Mutex<Option<DateTime<Utc>>>,
}

/// Serializable copy of [`IngestStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub chunks_complete: u64,
    pub chunks_partial: u64,
    pub chunks_failed: u64,
    pub chunks_cancelled: u64,
    /// Live buffers discarded because materializing them failed or no
    /// rendition transcoded them.
    pub chunks_dropped: u64,
    pub segments_produced: u64,
    pub last_ingest_at: Option<DateTime<Utc>>,
}

impl IngestStats {
    pub fn record(&self, report: &IngestReport) {
        let counter = match report.status() {
            ChunkStatus::Complete => &self.chunks_complete,
            ChunkStatus::Partial => &self.chunks_partial,
            ChunkStatus::Failed => &self.chunks_failed,
            ChunkStatus::Cancelled => &self.chunks_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.segments_produced
            .fetch_add(report.segments_produced(), Ordering::Relaxed);
        *self.last_ingest_at.lock() = Some(Utc::now());
    }

    pub fn record_dropped(&self) {
        self.chunks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_complete: self.chunks_complete.load(Ordering::Relaxed),
            chunks_partial: self.chunks_partial.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            chunks_cancelled: self.chunks_cancelled.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            segments_produced: self.segments_produced.load(Ordering::Relaxed),
            last_ingest_at: *self.last_ingest_at.lock(),
        }
    }
}
