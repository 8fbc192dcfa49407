//! Pipeline assembly.
//!
//! [`Pipeline`] wires the registry, frame queue, executor and fan-out hub
//! together and is the single entry point used by the transport layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use courtline_models::{CourtZones, StatusReport, StreamKey};
use courtline_queue::{FrameQueue, PushOutcome};

use crate::catalog::CameraCatalog;
use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::{InferenceExecutor, WorkerContext};
use crate::fanout::{spawn_decision_fanout, FanoutHub, RoomMessage};
use crate::inference::{BallDetector, BounceClassifier};
use crate::ingest::FrameIngestor;
use crate::registry::{ReplayClip, StreamHandle, StreamInfo, StreamRegistry, StreamSettings};
use crate::stats::{PipelineStats, StatsSnapshot};

struct Running {
    executor: InferenceExecutor,
    fanout: JoinHandle<()>,
}

pub struct Pipeline {
    config: WorkerConfig,
    registry: Arc<StreamRegistry>,
    queue: Arc<dyn FrameQueue>,
    hub: Arc<FanoutHub>,
    ingestor: FrameIngestor,
    stats: Arc<PipelineStats>,
    detector: Arc<dyn BallDetector>,
    classifier: Arc<dyn BounceClassifier>,
    running: Mutex<Option<Running>>,
}

impl Pipeline {
    /// Assemble a pipeline. Nothing runs until [`Pipeline::start`].
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn FrameQueue>,
        catalog: Arc<dyn CameraCatalog>,
        detector: Arc<dyn BallDetector>,
        classifier: Arc<dyn BounceClassifier>,
    ) -> Self {
        let config = config.clamped();
        let settings = StreamSettings {
            bounce_window: config.bounce_window,
            bounce_threshold: config.bounce_threshold,
            replay_capacity: config.replay_buffer_frames,
        };
        let registry = Arc::new(StreamRegistry::new(catalog, settings));
        let hub = Arc::new(FanoutHub::new(config.fanout_buffer));
        let stats = Arc::new(PipelineStats::new());
        let ingestor = FrameIngestor::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::clone(&hub),
            Arc::clone(&stats),
        );

        Self {
            config,
            registry,
            queue,
            hub,
            ingestor,
            stats,
            detector,
            classifier,
            running: Mutex::new(None),
        }
    }

    /// Spawn the executor and the decision fan-out task. Idempotent.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }

        let (decisions_tx, decisions_rx) = mpsc::channel(self.config.fanout_buffer);
        let fanout = spawn_decision_fanout(Arc::clone(&self.hub), decisions_rx);
        let ctx = WorkerContext {
            registry: Arc::clone(&self.registry),
            detector: Arc::clone(&self.detector),
            classifier: Arc::clone(&self.classifier),
            decisions: decisions_tx,
            stats: Arc::clone(&self.stats),
            ball_class: self.config.ball_class.clone(),
        };
        let executor = InferenceExecutor::start(&self.config, Arc::clone(&self.queue), ctx);

        info!(
            backend = self.queue.backend_name(),
            capacity = self.queue.capacity(),
            "Pipeline started"
        );
        *running = Some(Running { executor, fanout });
    }

    /// Close the queue and stop all tasks.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        self.queue.close();
        running.executor.shutdown(self.config.shutdown_timeout).await;

        // The fan-out task ends once every worker has dropped its sender.
        let mut fanout = running.fanout;
        if tokio::time::timeout(Duration::from_secs(1), &mut fanout)
            .await
            .is_err()
        {
            warn!("Decision fan-out still running, aborting");
            fanout.abort();
        }
        info!("Pipeline stopped");
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Jobs that reached a final outcome (processed, dropped or failed).
    pub fn settled_jobs(&self) -> u64 {
        self.stats.settled()
    }

    pub async fn register_stream(&self, key: StreamKey, fps: u32) -> PipelineResult<StreamHandle> {
        self.registry.register(key, fps).await
    }

    pub async fn unregister_stream(&self, key: &StreamKey) -> PipelineResult<()> {
        self.registry.unregister(key).await
    }

    /// Unregister a stream on behalf of the connection that registered it,
    /// leaving any newer registration of the same key alone.
    pub async fn release_stream(&self, handle: &StreamHandle) -> bool {
        self.registry.release(handle).await
    }

    pub async fn ingest_frame(&self, key: &StreamKey, jpg_b64: &str) -> PipelineResult<PushOutcome> {
        self.ingestor.ingest(key, jpg_b64).await
    }

    pub async fn set_zones(&self, key: &StreamKey, zones: CourtZones) -> PipelineResult<()> {
        self.registry.set_zones(key, zones).await
    }

    /// Frames covering the last `duration_secs` seconds.
    pub async fn replay(&self, key: &StreamKey, duration_secs: f64) -> PipelineResult<ReplayClip> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(PipelineError::invalid_request(format!(
                "replay duration must be positive, got {}",
                duration_secs
            )));
        }
        self.registry.replay(key, duration_secs).await
    }

    /// Join the viewer room of `cam_id`.
    pub async fn subscribe(&self, cam_id: &str) -> broadcast::Receiver<RoomMessage> {
        self.hub.subscribe(cam_id).await
    }

    pub async fn streams(&self) -> Vec<StreamInfo> {
        self.registry.list().await
    }

    pub async fn status(&self) -> StatusReport {
        let catalog = self.registry.catalog().summary().await;
        let stats = self.stats.snapshot();
        let queue_depth = match self.queue.len().await {
            Ok(depth) => depth,
            Err(e) => {
                warn!("Failed to read queue depth: {}", e);
                0
            }
        };

        StatusReport {
            ok: true,
            courts: catalog.courts,
            total_cameras: catalog.cameras,
            active_streams: self.registry.len().await,
            queue_depth,
            frames_processed: stats.processed,
            frames_dropped: stats.dropped,
            frames_failed: stats.failed,
        }
    }
}
