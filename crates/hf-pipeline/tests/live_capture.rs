//! Live frame buffering and flushing.

mod common;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{Harness, Script};
use hf_av::Frame;
use hf_core::Error;
use hf_pipeline::{run_live, ChunkOutcome, ChunkStatus, LiveCapture};

fn frame(width: u32, height: u32) -> Frame {
    Frame::new(width, height, Bytes::from(vec![0u8; Frame::byte_len(width, height)])).unwrap()
}

/// 2 fps x 2 s: a chunk every 4 frames.
fn harness() -> Harness {
    Harness::with(2, |c| {
        c.live.fps = 2;
        c.live.chunk_seconds = 2;
    })
}

fn capture(h: &Harness) -> LiveCapture {
    LiveCapture::new(h.pipeline.clone(), h.config.live.clone(), Some(900))
}

fn work_dir_entries(h: &Harness) -> usize {
    std::fs::read_dir(&h.config.live.work_dir)
        .map(|d| d.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn flushes_every_full_chunk() {
    let h = harness();
    let mut live = capture(&h);
    let cancel = CancellationToken::new();

    let mut outcomes = Vec::new();
    for _ in 0..9 {
        if let Some(outcome) = live.push_frame(frame(4, 2), &cancel).await.unwrap() {
            outcomes.push(outcome);
        }
    }
    assert_eq!(outcomes.len(), 2);
    assert_eq!(live.buffered(), 1);
    for outcome in &outcomes {
        match outcome {
            ChunkOutcome::Ingested(report) => assert_eq!(report.status(), ChunkStatus::Complete),
            other => panic!("unexpected {other:?}"),
        }
    }

    let trailing = live.finish(&cancel).await.expect("trailing chunk");
    assert!(matches!(trailing, ChunkOutcome::Ingested(_)));
    assert_eq!(live.buffered(), 0);
    assert!(live.finish(&cancel).await.is_none());

    let sizes: Vec<usize> = h.encoder.materialized().iter().map(|(_, n)| *n).collect();
    assert_eq!(sizes, vec![4, 4, 1]);
    assert_eq!(h.sequences("low"), (0..6).collect::<Vec<u64>>());

    // Intermediates are deleted after each flush.
    assert_eq!(work_dir_entries(&h), 0);
    for (path, _) in h.encoder.materialized() {
        assert!(!path.exists());
        assert!(path.starts_with(&h.config.live.work_dir));
    }
}

#[tokio::test]
async fn failed_materialize_drops_and_clears_buffer() {
    let h = harness();
    let mut live = capture(&h);
    let cancel = CancellationToken::new();
    h.encoder.fail_materialize(true);

    let mut dropped = None;
    for _ in 0..4 {
        dropped = live.push_frame(frame(4, 2), &cancel).await.unwrap();
    }
    match dropped {
        Some(ChunkOutcome::Dropped { frames, .. }) => assert_eq!(frames, 4),
        other => panic!("expected drop, got {other:?}"),
    }
    assert_eq!(live.buffered(), 0);
    assert!(h.encoder.jobs().is_empty());
    assert_eq!(h.pipeline.stats().snapshot().chunks_dropped, 1);
    assert_eq!(work_dir_entries(&h), 0);

    // The next chunk goes through normally.
    h.encoder.fail_materialize(false);
    let mut last = None;
    for _ in 0..4 {
        last = live.push_frame(frame(4, 2), &cancel).await.unwrap();
    }
    assert!(matches!(last, Some(ChunkOutcome::Ingested(_))));
    assert_eq!(h.sequences("low"), vec![0, 1]);
}

#[tokio::test]
async fn chunk_with_every_rendition_failing_is_dropped() {
    // 2 fps x 1 s: a chunk every 2 frames.
    let h = Harness::with(2, |c| {
        c.live.fps = 2;
        c.live.chunk_seconds = 1;
    });
    for rendition in ["low", "medium", "high"] {
        h.encoder.script(rendition, 0, Script::Fail);
    }
    let mut live = capture(&h);
    let cancel = CancellationToken::new();

    let (tx, rx) = mpsc::channel(4);
    for _ in 0..2 {
        tx.send(frame(4, 2)).await.unwrap();
    }
    drop(tx);

    let summary = run_live(rx, &mut live, &cancel).await;
    assert_eq!(summary.frames_received, 2);
    assert_eq!(summary.chunks_ingested, 0);
    assert_eq!(summary.chunks_dropped, 1);

    let stats = h.pipeline.stats().snapshot();
    assert_eq!(stats.chunks_dropped, 1);
    assert_eq!(stats.chunks_failed, 1);
    assert_eq!(work_dir_entries(&h), 0);
}

#[tokio::test]
async fn mismatched_geometry_is_rejected() {
    let h = harness();
    let mut live = capture(&h);
    let cancel = CancellationToken::new();

    live.push_frame(frame(4, 2), &cancel).await.unwrap();
    let err = live.push_frame(frame(2, 2), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(live.buffered(), 1);
}

#[tokio::test]
async fn geometry_may_change_between_chunks() {
    let h = harness();
    let mut live = capture(&h);
    let cancel = CancellationToken::new();

    for _ in 0..4 {
        live.push_frame(frame(4, 2), &cancel).await.unwrap();
    }
    assert!(live.push_frame(frame(2, 2), &cancel).await.is_ok());
}

#[tokio::test]
async fn run_live_drains_producer_and_flushes_tail() {
    let h = harness();
    let mut live = capture(&h);
    let cancel = CancellationToken::new();

    let (tx, rx) = mpsc::channel(8);
    let producer = tokio::spawn(async move {
        for i in 0..10 {
            let f = if i == 5 { frame(2, 2) } else { frame(4, 2) };
            tx.send(f).await.unwrap();
        }
    });

    let summary = run_live(rx, &mut live, &cancel).await;
    producer.await.unwrap();

    assert_eq!(summary.frames_received, 10);
    assert_eq!(summary.frames_rejected, 1);
    assert_eq!(summary.chunks_ingested, 3);
    assert_eq!(summary.chunks_dropped, 0);
    assert_eq!(summary.frames_discarded, 0);
}

#[tokio::test]
async fn run_live_discards_buffer_on_stop() {
    let h = harness();
    let mut live = capture(&h);
    let cancel = CancellationToken::new();

    // Producer stays open, so only the stop signal ends the session.
    let (tx, rx) = mpsc::channel(8);
    for _ in 0..3 {
        tx.send(frame(4, 2)).await.unwrap();
    }
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stopper.cancel();
    });

    let summary = run_live(rx, &mut live, &cancel).await;
    drop(tx);

    assert_eq!(summary.frames_received, 3);
    assert_eq!(summary.chunks_ingested, 0);
    assert_eq!(summary.frames_discarded, 3);
    assert!(h.encoder.materialized().is_empty());
}
