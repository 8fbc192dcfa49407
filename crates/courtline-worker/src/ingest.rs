//! Frame ingestion.
//!
//! Validates that the stream is live, forwards the raw frame to the camera's
//! viewers as a live preview, and enqueues a job for inference. Never waits
//! on inference.

use std::sync::Arc;

use tracing::debug;

use courtline_models::{ServerMessage, StreamKey};
use courtline_queue::{FrameJob, FrameQueue, PushOutcome, QueueError};

use crate::error::{PipelineError, PipelineResult};
use crate::fanout::FanoutHub;
use crate::metrics;
use crate::registry::StreamRegistry;
use crate::stats::PipelineStats;

#[derive(Clone)]
pub struct FrameIngestor {
    registry: Arc<StreamRegistry>,
    queue: Arc<dyn FrameQueue>,
    hub: Arc<FanoutHub>,
    stats: Arc<PipelineStats>,
}

impl FrameIngestor {
    pub fn new(
        registry: Arc<StreamRegistry>,
        queue: Arc<dyn FrameQueue>,
        hub: Arc<FanoutHub>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            registry,
            queue,
            hub,
            stats,
        }
    }

    /// Accept one base64 JPEG frame for `key`.
    pub async fn ingest(&self, key: &StreamKey, jpg_b64: &str) -> PipelineResult<PushOutcome> {
        if self.registry.get(key).await.is_none() {
            metrics::record_frame_ingested("unknown_stream");
            return Err(PipelineError::UnknownStream(key.clone()));
        }

        let job = FrameJob::from_base64(key.clone(), jpg_b64).map_err(|e| {
            metrics::record_frame_ingested("malformed");
            PipelineError::from(e)
        })?;

        self.hub
            .publish(&key.cam_id, ServerMessage::live_frame(&key.cam_id, jpg_b64))
            .await;

        match self.queue.push(job).await {
            Ok(outcome) => {
                let evicted = match outcome {
                    PushOutcome::Enqueued => 0,
                    PushOutcome::EvictedOldest { evicted } => evicted,
                };
                if evicted > 0 {
                    self.stats.record_dropped(evicted as u64);
                    debug!(stream = %key, evicted, "Queue full, evicted oldest jobs");
                }
                metrics::record_frame_ingested("enqueued");
                metrics::record_job_enqueued(evicted);
                Ok(outcome)
            }
            Err(QueueError::Full { capacity }) => {
                self.stats.record_dropped(1);
                metrics::record_frame_ingested("rejected");
                metrics::record_job_rejected();
                Err(PipelineError::Queue(QueueError::Full { capacity }))
            }
            Err(e) => Err(e.into()),
        }
    }
}
