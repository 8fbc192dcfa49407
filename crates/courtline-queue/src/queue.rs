//! Bounded FIFO frame queue.
//!
//! Producers never block: when the queue is at capacity the configured
//! [`OverflowPolicy`] either evicts the oldest job or rejects the new one.
//! Consumers block in [`FrameQueue::pop`] until a job arrives.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::FrameJob;
use crate::redis_queue::RedisQueue;

/// What to do with a push when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued job to make room; stale frames have little value
    #[default]
    DropOldest,
    /// Refuse the new job with `QueueError::Full`
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop_oldest" | "drop-oldest" | "evict" => Ok(OverflowPolicy::DropOldest),
            "reject" | "reject_newest" => Ok(OverflowPolicy::Reject),
            other => Err(QueueError::config(format!("unknown overflow policy '{}'", other))),
        }
    }
}

/// Where jobs are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueBackend {
    /// In-process queue; ingestion and workers share one process
    #[default]
    Memory,
    /// Redis list; lets several processes feed the same workers
    Redis,
}

impl FromStr for QueueBackend {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(QueueBackend::Memory),
            "redis" => Ok(QueueBackend::Redis),
            other => Err(QueueError::config(format!("unknown queue backend '{}'", other))),
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// Redis URL (redis backend only)
    pub redis_url: String,
    /// Redis list name (redis backend only)
    pub queue_name: String,
    /// Maximum number of queued jobs
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            queue_name: "inference_queue".to_string(),
            capacity: 256,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: std::env::var("QUEUE_BACKEND")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.backend),
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            queue_name: std::env::var("QUEUE_NAME").unwrap_or(defaults.queue_name),
            capacity: std::env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.capacity)
                .max(1),
            overflow: std::env::var("QUEUE_OVERFLOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.overflow),
        }
    }

    /// Build the configured queue.
    pub fn connect(&self) -> QueueResult<Arc<dyn FrameQueue>> {
        match self.backend {
            QueueBackend::Memory => Ok(Arc::new(MemoryQueue::new(self.capacity, self.overflow))),
            QueueBackend::Redis => Ok(Arc::new(RedisQueue::new(self)?)),
        }
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// The job was queued and `evicted` older jobs were dropped to make room
    EvictedOldest { evicted: usize },
}

/// FIFO job queue shared by ingestion (producers) and dispatch (consumer).
#[async_trait]
pub trait FrameQueue: Send + Sync {
    /// Enqueue without waiting on consumers.
    async fn push(&self, job: FrameJob) -> QueueResult<PushOutcome>;

    /// Dequeue the oldest job, waiting indefinitely while the queue is empty.
    ///
    /// Returns `QueueError::Closed` once the queue is closed and drained.
    async fn pop(&self) -> QueueResult<FrameJob>;

    async fn len(&self) -> QueueResult<usize>;

    fn capacity(&self) -> usize;

    /// Wake blocked consumers and refuse further pushes.
    fn close(&self);

    fn backend_name(&self) -> &'static str;
}

/// In-process bounded queue.
pub struct MemoryQueue {
    jobs: Mutex<VecDeque<FrameJob>>,
    capacity: usize,
    overflow: OverflowPolicy,
    available: Notify,
    closed: AtomicBool,
}

impl MemoryQueue {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        info!(capacity, ?overflow, "Created in-memory frame queue");
        Self {
            jobs: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            overflow,
            available: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<FrameJob>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_pop(&self) -> Option<FrameJob> {
        self.lock().pop_front()
    }
}

#[async_trait]
impl FrameQueue for MemoryQueue {
    async fn push(&self, job: FrameJob) -> QueueResult<PushOutcome> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let outcome = {
            let mut jobs = self.lock();
            let mut evicted = 0;
            while jobs.len() >= self.capacity {
                match self.overflow {
                    OverflowPolicy::Reject => {
                        return Err(QueueError::Full {
                            capacity: self.capacity,
                        });
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(old) = jobs.pop_front() {
                            debug!(stream = %old.stream, "Evicted oldest queued frame");
                        }
                        evicted += 1;
                    }
                }
            }
            jobs.push_back(job);

            if evicted > 0 {
                PushOutcome::EvictedOldest { evicted }
            } else {
                PushOutcome::Enqueued
            }
        };

        self.available.notify_one();
        Ok(outcome)
    }

    async fn pop(&self) -> QueueResult<FrameJob> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register interest before checking so a concurrent push is never missed.
            notified.as_mut().enable();

            if let Some(job) = self.try_pop() {
                return Ok(job);
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(QueueError::Closed);
            }

            notified.await;
        }
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.lock().len())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            warn!("Frame queue closed");
        }
        self.available.notify_waiters();
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
