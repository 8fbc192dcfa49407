//! Worker metrics reach the Prometheus recorder.
//!
//! Kept in its own test binary: the recorder is process-global.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use courtline_api::metrics::start_pipeline;
use courtline_models::StreamKey;
use courtline_queue::{MemoryQueue, OverflowPolicy};
use courtline_worker::{
    BallDetector, BounceClassifier, DecodedFrame, Detection, InMemoryCatalog, Pipeline,
    PipelineResult, WorkerConfig,
};

struct NoBall;

#[async_trait]
impl BallDetector for NoBall {
    async fn detect(&self, _frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl BounceClassifier for NoBall {
    async fn bounce_probability(&self, _window: &[[f32; 2]]) -> PipelineResult<f32> {
        Ok(0.0)
    }
}

#[tokio::test]
async fn test_worker_metrics_recorded_from_first_job() {
    let pipeline = Pipeline::new(
        WorkerConfig::default(),
        Arc::new(MemoryQueue::new(8, OverflowPolicy::DropOldest)),
        Arc::new(InMemoryCatalog::new().with_camera("court-1", "1")),
        Arc::new(NoBall),
        Arc::new(NoBall),
    );
    let key = StreamKey::new("court-1", "1");
    pipeline.register_stream(key.clone(), 30).await.unwrap();

    let handle = start_pipeline(&pipeline, true).await.unwrap().unwrap();

    // Not a JPEG, so the worker fails it.
    pipeline
        .ingest_frame(&key, &STANDARD.encode(b"not a jpeg"))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while pipeline.settled_jobs() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not settle");

    let rendered = handle.render();
    assert!(rendered.contains("courtline_frames_ingested_total"));
    assert!(rendered.contains("courtline_jobs_failed_total"));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_disabled_metrics_still_start_pipeline() {
    let pipeline = Pipeline::new(
        WorkerConfig::default(),
        Arc::new(MemoryQueue::new(8, OverflowPolicy::DropOldest)),
        Arc::new(InMemoryCatalog::permissive()),
        Arc::new(NoBall),
        Arc::new(NoBall),
    );

    assert!(start_pipeline(&pipeline, false).await.unwrap().is_none());
    let key = StreamKey::new("court-1", "1");
    pipeline.register_stream(key.clone(), 30).await.unwrap();
    pipeline
        .ingest_frame(&key, &STANDARD.encode(b"not a jpeg"))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while pipeline.settled_jobs() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not settle");

    pipeline.shutdown().await;
}
