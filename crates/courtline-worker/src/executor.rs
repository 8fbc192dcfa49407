//! Inference dispatch.
//!
//! A dispatcher task pops jobs from the frame queue and routes each one to a
//! worker chosen by hashing its stream key, so every stream has a single
//! writer and its decisions keep frame order. Workers decode, detect,
//! classify, update stream state and hand decisions to the fan-out channel.
//!
//! The dispatcher never waits on a worker. When a worker's inbox is full the
//! job is dropped, so a stalled detector only holds up the streams routed to
//! that worker.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use courtline_models::{Decision, StreamKey};
use courtline_queue::{FrameJob, FrameQueue, QueueError};

use crate::config::WorkerConfig;
use crate::error::PipelineResult;
use crate::frame::decode_jpeg;
use crate::inference::{select_ball, BallDetector, BounceClassifier};
use crate::metrics;
use crate::registry::{StreamRegistry, StreamSlot};
use crate::stats::PipelineStats;

/// Jobs buffered per worker between the dispatcher and the worker.
const WORKER_INBOX_SIZE: usize = 16;

/// Pause after a queue backend error before popping again.
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// What happened to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Published,
    /// Stream was not registered when the job was dequeued
    Unregistered,
    /// Job predates the stream's current registration
    Stale,
    /// Stream was unregistered or replaced while the job was in flight
    Retired,
    /// The fan-out channel was full
    FanoutFull,
    /// The stream's worker inbox was full
    WorkerBusy,
}

impl JobOutcome {
    fn drop_reason(&self) -> Option<&'static str> {
        match self {
            JobOutcome::Published => None,
            JobOutcome::Unregistered => Some("unregistered"),
            JobOutcome::Stale => Some("stale"),
            JobOutcome::Retired => Some("retired"),
            JobOutcome::FanoutFull => Some("fanout_full"),
            JobOutcome::WorkerBusy => Some("worker_busy"),
        }
    }
}

/// Everything a worker needs to process a job.
pub struct WorkerContext {
    pub registry: Arc<StreamRegistry>,
    pub detector: Arc<dyn BallDetector>,
    pub classifier: Arc<dyn BounceClassifier>,
    pub decisions: mpsc::Sender<Decision>,
    pub stats: Arc<PipelineStats>,
    pub ball_class: String,
}

/// Running dispatcher and workers.
pub struct InferenceExecutor {
    shutdown: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl InferenceExecutor {
    /// Spawn the dispatcher and `config.worker_count` workers.
    pub fn start(config: &WorkerConfig, queue: Arc<dyn FrameQueue>, ctx: WorkerContext) -> Self {
        let worker_count = config.worker_count.max(1);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(ctx);

        let mut inboxes = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let (tx, rx) = mpsc::channel(WORKER_INBOX_SIZE);
            inboxes.push(tx);
            workers.push(tokio::spawn(run_worker(id, Arc::clone(&ctx), rx)));
        }

        let dispatcher = tokio::spawn(run_dispatcher(queue, inboxes, shutdown_rx, ctx));

        info!("Started inference executor with {} workers", worker_count);
        Self {
            shutdown,
            dispatcher,
            workers,
        }
    }

    /// Stop dispatching, let workers finish their inboxes, and wait up to
    /// `timeout` for everything to exit.
    pub async fn shutdown(self, timeout: Duration) {
        let _ = self.shutdown.send(true);

        let join_all = async {
            if let Err(e) = self.dispatcher.await {
                error!("Dispatcher task failed: {}", e);
            }
            for worker in self.workers {
                if let Err(e) = worker.await {
                    error!("Worker task failed: {}", e);
                }
            }
        };

        if tokio::time::timeout(timeout, join_all).await.is_err() {
            warn!("Inference executor did not stop within {:?}", timeout);
        } else {
            info!("Inference executor stopped");
        }
    }
}

fn route(key: &StreamKey, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

async fn run_dispatcher(
    queue: Arc<dyn FrameQueue>,
    inboxes: Vec<mpsc::Sender<FrameJob>>,
    mut shutdown_rx: watch::Receiver<bool>,
    ctx: Arc<WorkerContext>,
) {
    loop {
        let popped = tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received, stopping dispatcher");
                    break;
                }
                continue;
            }
            popped = queue.pop() => popped,
        };

        match popped {
            Ok(job) => {
                let idx = route(&job.stream, inboxes.len());
                match inboxes[idx].try_send(job) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(job)) => {
                        debug!(stream = %job.stream, worker = idx, "Worker busy, dropping frame");
                        record_outcome(&ctx, JobOutcome::WorkerBusy);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        error!(worker = idx, "Worker inbox closed, stopping dispatcher");
                        break;
                    }
                }
            }
            Err(QueueError::Closed) => {
                info!("Frame queue closed, stopping dispatcher");
                break;
            }
            Err(e) if e.is_per_job() => {
                warn!("Dropping malformed job: {}", e);
                ctx.stats.record_failed();
                metrics::record_job_failed("malformed_job");
            }
            Err(e) => {
                error!("Error popping frame queue: {}", e);
                tokio::time::sleep(QUEUE_ERROR_BACKOFF).await;
            }
        }

        if let Ok(depth) = queue.len().await {
            metrics::set_queue_depth(depth);
        }
    }
    // Dropping the inboxes lets workers drain and exit.
}

async fn run_worker(id: usize, ctx: Arc<WorkerContext>, mut inbox: mpsc::Receiver<FrameJob>) {
    debug!(worker = id, "Worker started");
    while let Some(job) = inbox.recv().await {
        execute_job(&ctx, job).await;
    }
    debug!(worker = id, "Worker stopped");
}

/// Process one job and account for its outcome. Never fails.
pub async fn execute_job(ctx: &WorkerContext, job: FrameJob) {
    let started = Instant::now();
    let stream = job.stream.clone();

    match process_job(ctx, job).await {
        Ok(JobOutcome::Published) => {
            ctx.stats.record_processed();
            metrics::record_job_processed(started.elapsed().as_secs_f64());
        }
        Ok(outcome) => {
            debug!(stream = %stream, reason = ?outcome, "Dropped job result");
            record_outcome(ctx, outcome);
        }
        Err(e) => {
            if e.is_per_job() {
                warn!(stream = %stream, "Job failed: {}", e);
            } else {
                error!(stream = %stream, "Job failed unexpectedly: {}", e);
            }
            ctx.stats.record_failed();
            metrics::record_job_failed(e.kind());
        }
    }
}

fn record_outcome(ctx: &WorkerContext, outcome: JobOutcome) {
    let reason = outcome.drop_reason().unwrap_or("unknown");
    ctx.stats.record_dropped(1);
    metrics::record_job_dropped(reason);
}

/// Run one frame through detection, the bounce state machine and the
/// replay buffer, then hand the decision to the fan-out channel.
pub async fn process_job(ctx: &WorkerContext, job: FrameJob) -> PipelineResult<JobOutcome> {
    let Some(slot) = ctx.registry.get(&job.stream).await else {
        return Ok(JobOutcome::Unregistered);
    };
    if slot.is_stale(job.enqueued_at) {
        return Ok(JobOutcome::Stale);
    }

    let span = slot.logger().job_span();
    process_frame(ctx, &slot, job).instrument(span).await
}

async fn process_frame(
    ctx: &WorkerContext,
    slot: &StreamSlot,
    job: FrameJob,
) -> PipelineResult<JobOutcome> {
    let frame = decode_jpeg(Arc::clone(&job.frame)).await?;
    let detections = ctx.detector.detect(&frame).await?;
    let ball = select_ball(&detections, &ctx.ball_class);

    // Stream state only changes once the classifier has answered.
    let window = {
        let state = slot.lock().await;
        if state.is_retired() {
            return Ok(JobOutcome::Retired);
        }
        state.bounce.candidate_window(ball)
    };

    let probability = match window {
        Some(window) => Some(ctx.classifier.bounce_probability(&window).await?),
        None => None,
    };

    let mut guard = slot.lock().await;
    if guard.is_retired() {
        return Ok(JobOutcome::Retired);
    }
    let state = &mut *guard;
    let verdict = state.bounce.record(ball, probability, &state.zones);
    state.replay.push(frame);

    // Sent under the state lock so an unregister cannot slip in between.
    let decision = Decision::new(job.stream, ball, verdict);
    match ctx.decisions.try_send(decision) {
        Ok(()) => Ok(JobOutcome::Published),
        Err(mpsc::error::TrySendError::Full(_)) => Ok(JobOutcome::FanoutFull),
        Err(mpsc::error::TrySendError::Closed(_)) => Ok(JobOutcome::Retired),
    }
}
