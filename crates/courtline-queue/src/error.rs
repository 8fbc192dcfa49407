//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue full ({capacity} jobs)")]
    Full { capacity: usize },

    #[error("Queue closed")]
    Closed,

    #[error("Malformed job: {0}")]
    MalformedJob(String),

    #[error("Invalid queue configuration: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedJob(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors caused by one bad payload rather than the queue itself.
    pub fn is_per_job(&self) -> bool {
        matches!(self, QueueError::MalformedJob(_) | QueueError::Json(_))
    }
}
