//! Redis list backed frame queue.
//!
//! Jobs are JSON envelopes pushed with `RPUSH` and consumed with `BLPOP`.
//! With the drop-oldest policy the push is followed by an `LTRIM` in the
//! same transaction, so the list never exceeds its capacity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncConnectionConfig;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::FrameJob;
use crate::queue::{FrameQueue, OverflowPolicy, PushOutcome, QueueConfig};

/// Seconds each `BLPOP` waits before re-checking for close.
const POP_WAIT_SECS: u64 = 1;

pub struct RedisQueue {
    client: redis::Client,
    queue_name: String,
    capacity: usize,
    overflow: OverflowPolicy,
    closed: AtomicBool,
}

impl RedisQueue {
    pub fn new(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        info!(
            queue = %config.queue_name,
            capacity = config.capacity,
            "Created Redis frame queue"
        );
        Ok(Self {
            client,
            queue_name: config.queue_name.clone(),
            capacity: config.capacity.max(1),
            overflow: config.overflow,
            closed: AtomicBool::new(false),
        })
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        // BLPOP holds the reply open for POP_WAIT_SECS.
        let config = AsyncConnectionConfig::new()
            .set_response_timeout(Duration::from_secs(POP_WAIT_SECS + 5));
        Ok(self
            .client
            .get_multiplexed_async_connection_with_config(&config)
            .await?)
    }

    /// Remove every queued job. Used by tests and admin resets.
    pub async fn clear(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(&self.queue_name)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FrameQueue for RedisQueue {
    async fn push(&self, job: FrameJob) -> QueueResult<PushOutcome> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let payload = job.to_json()?;
        let mut conn = self.connection().await?;

        match self.overflow {
            OverflowPolicy::Reject => {
                let len: usize = redis::cmd("LLEN")
                    .arg(&self.queue_name)
                    .query_async(&mut conn)
                    .await?;
                if len >= self.capacity {
                    return Err(QueueError::Full {
                        capacity: self.capacity,
                    });
                }
                redis::cmd("RPUSH")
                    .arg(&self.queue_name)
                    .arg(payload)
                    .query_async::<()>(&mut conn)
                    .await?;
                Ok(PushOutcome::Enqueued)
            }
            OverflowPolicy::DropOldest => {
                let (len,): (usize,) = redis::pipe()
                    .atomic()
                    .cmd("RPUSH")
                    .arg(&self.queue_name)
                    .arg(payload)
                    .cmd("LTRIM")
                    .arg(&self.queue_name)
                    .arg(-(self.capacity as i64))
                    .arg(-1)
                    .ignore()
                    .query_async(&mut conn)
                    .await?;

                let evicted = len.saturating_sub(self.capacity);
                if evicted > 0 {
                    debug!(stream = %job.stream, evicted, "Trimmed oldest queued frames");
                    Ok(PushOutcome::EvictedOldest { evicted })
                } else {
                    Ok(PushOutcome::Enqueued)
                }
            }
        }
    }

    async fn pop(&self) -> QueueResult<FrameJob> {
        let mut conn = self.connection().await?;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(QueueError::Closed);
            }

            let reply: Option<(String, String)> = redis::cmd("BLPOP")
                .arg(&self.queue_name)
                .arg(POP_WAIT_SECS)
                .query_async(&mut conn)
                .await?;

            if let Some((_, payload)) = reply {
                return FrameJob::from_json(&payload);
            }
        }
    }

    async fn len(&self) -> QueueResult<usize> {
        let mut conn = self.connection().await?;
        Ok(redis::cmd("LLEN")
            .arg(&self.queue_name)
            .query_async(&mut conn)
            .await?)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            warn!(queue = %self.queue_name, "Redis frame queue closed");
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
