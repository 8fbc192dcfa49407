//! Frame job queue.
//!
//! This crate provides:
//! - `FrameJob`, the unit of work handed from ingestion to inference
//! - A bounded in-memory queue with drop-oldest or reject overflow
//! - A Redis list backend sharing the same `FrameQueue` interface

pub mod error;
pub mod job;
pub mod queue;
pub mod redis_queue;

pub use error::{QueueError, QueueResult};
pub use job::{FrameJob, JobEnvelope};
pub use queue::{FrameQueue, MemoryQueue, OverflowPolicy, PushOutcome, QueueBackend, QueueConfig};
pub use redis_queue::RedisQueue;
