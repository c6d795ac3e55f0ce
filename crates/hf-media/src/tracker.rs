//! Per-rendition segment sequence counters.
//!
//! A [`SegmentIndexTracker`] is built once per process and shared by every
//! ingestion path. Each rendition gets its own async mutex; holding the
//! [`RenditionGuard`] across "read start index, transcode, advance" is what
//! keeps two batches from claiming overlapping sequence numbers.
//!
//! Counters are seeded lazily from disk on first use and then only move
//! forward. Segments deleted out-of-band afterwards are not noticed until
//! [`SegmentIndexTracker::reseed`] is called.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::layout;

#[derive(Debug, Default)]
struct Slot {
    /// Next sequence number; `None` until seeded from disk.
    next: Option<u64>,
}

/// What the seeding scan found.
#[derive(Debug)]
enum SeedOutcome {
    DirMissing,
    Empty,
    Found { max: u64, count: usize },
    ListingFailed(io::Error),
}

impl SeedOutcome {
    fn next_index(&self) -> u64 {
        match self {
            SeedOutcome::Found { max, .. } => max + 1,
            _ => 0,
        }
    }
}

/// Counter value before and after an explicit re-seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReseedReport {
    pub rendition: String,
    /// Cached value before the rescan; `None` if it was never seeded.
    pub previous: Option<u64>,
    pub current: u64,
}

impl ReseedReport {
    /// Whether the cached counter disagreed with disk.
    pub fn changed(&self) -> bool {
        self.previous.is_some_and(|p| p != self.current)
    }
}

/// Point-in-time view of one counter, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub rendition: String,
    /// `None` if not seeded yet, or if a batch holds the lock right now.
    pub next_index: Option<u64>,
    pub busy: bool,
}

/// Process-wide map from rendition name to next sequence number.
#[derive(Debug)]
pub struct SegmentIndexTracker {
    root: PathBuf,
    slots: DashMap<String, Arc<Mutex<Slot>>>,
}

impl SegmentIndexTracker {
    /// Create a tracker for the output tree at `root`. Nothing is scanned yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            slots: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot(&self, rendition: &str) -> Arc<Mutex<Slot>> {
        self.slots
            .entry(rendition.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Enter the critical section for `rendition`.
    ///
    /// The guard must be held from reading the start index until the batch
    /// has advanced (or abandoned) the counter.
    pub async fn lock(&self, rendition: &str) -> RenditionGuard {
        let guard = self.slot(rendition).lock_owned().await;
        RenditionGuard {
            rendition: rendition.to_string(),
            dir: layout::rendition_dir(&self.root, rendition),
            guard,
        }
    }

    /// Next sequence number for `rendition`, seeding from disk on first call.
    pub async fn next_start_index(&self, rendition: &str) -> u64 {
        self.lock(rendition).await.next_start_index()
    }

    /// Move the counter forward by `count` segments.
    pub async fn advance(&self, rendition: &str, count: u64) {
        self.lock(rendition).await.advance(count);
    }

    /// Drop the cached counter for `rendition` and rescan its directory.
    pub async fn reseed(&self, rendition: &str) -> ReseedReport {
        let mut guard = self.lock(rendition).await;
        let previous = guard.guard.next.take();
        let current = guard.next_start_index();

        let report = ReseedReport {
            rendition: rendition.to_string(),
            previous,
            current,
        };
        if report.changed() {
            tracing::warn!(
                rendition,
                previous = ?previous,
                current,
                "Segment counter disagreed with disk; re-seeded"
            );
        }
        report
    }

    /// Re-seed every rendition the tracker has seen.
    pub async fn reseed_all(&self) -> Vec<ReseedReport> {
        let mut names: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        names.sort();

        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            reports.push(self.reseed(&name).await);
        }
        reports
    }

    /// Current counters without waiting on busy renditions, sorted by name.
    pub fn snapshot(&self) -> Vec<CounterSnapshot> {
        let mut out: Vec<CounterSnapshot> = self
            .slots
            .iter()
            .map(|entry| match entry.value().try_lock() {
                Ok(slot) => CounterSnapshot {
                    rendition: entry.key().clone(),
                    next_index: slot.next,
                    busy: false,
                },
                Err(_) => CounterSnapshot {
                    rendition: entry.key().clone(),
                    next_index: None,
                    busy: true,
                },
            })
            .collect();
        out.sort_by(|a, b| a.rendition.cmp(&b.rendition));
        out
    }
}

/// Exclusive access to one rendition's counter.
#[derive(Debug)]
pub struct RenditionGuard {
    rendition: String,
    dir: PathBuf,
    guard: OwnedMutexGuard<Slot>,
}

impl RenditionGuard {
    pub fn rendition(&self) -> &str {
        &self.rendition
    }

    /// Next sequence number, seeding from disk if this rendition has not
    /// been seen before.
    pub fn next_start_index(&mut self) -> u64 {
        if let Some(next) = self.guard.next {
            return next;
        }
        let outcome = scan(&self.dir, &self.rendition);
        log_seed(&self.rendition, &self.dir, &outcome);
        let next = outcome.next_index();
        self.guard.next = Some(next);
        next
    }

    /// Record `count` new segments after a successful batch.
    pub fn advance(&mut self, count: u64) {
        let next = self.next_start_index().saturating_add(count);
        self.guard.next = Some(next);
        tracing::debug!(rendition = %self.rendition, count, next, "Advanced segment counter");
    }
}

fn scan(dir: &Path, rendition: &str) -> SeedOutcome {
    match layout::list_segments(dir, rendition) {
        Ok(segments) => match segments.last() {
            Some(last) => SeedOutcome::Found {
                max: last.sequence,
                count: segments.len(),
            },
            None => SeedOutcome::Empty,
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => SeedOutcome::DirMissing,
        Err(e) => SeedOutcome::ListingFailed(e),
    }
}

fn log_seed(rendition: &str, dir: &Path, outcome: &SeedOutcome) {
    match outcome {
        SeedOutcome::DirMissing => {
            tracing::info!(rendition, "No segment directory at {}; starting at 0", dir.display())
        }
        SeedOutcome::Empty => {
            tracing::info!(rendition, "Segment directory {} is empty; starting at 0", dir.display())
        }
        SeedOutcome::Found { max, count } => tracing::info!(
            rendition,
            existing = count,
            next = max + 1,
            "Resuming after existing segments in {}",
            dir.display()
        ),
        SeedOutcome::ListingFailed(e) => tracing::warn!(
            rendition,
            error = %e,
            "Could not list {}; treating as empty and starting at 0",
            dir.display()
        ),
    }
}
