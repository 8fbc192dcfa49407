//! Pipeline error types.

use courtline_models::StreamKey;
use courtline_queue::QueueError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The camera is not in the catalog, or the stream is not registered
    #[error("Unknown stream: {0}")]
    UnknownStream(StreamKey),

    #[error("Stream not found")]
    NotFound(StreamKey),

    #[error("No frames available")]
    NoFramesAvailable(StreamKey),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Detection failed: {0}")]
    DetectionFailure(String),

    #[error("Malformed job: {0}")]
    MalformedJob(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Queue error: {0}")]
    Queue(QueueError),
}

impl PipelineError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::DetectionFailure(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedJob(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Errors confined to one job: logged and dropped by the dispatch loop.
    pub fn is_per_job(&self) -> bool {
        matches!(
            self,
            PipelineError::DetectionFailure(_) | PipelineError::MalformedJob(_)
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnknownStream(_) => "unknown_stream",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::NoFramesAvailable(_) => "no_frames",
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::DetectionFailure(_) => "detection_failure",
            PipelineError::MalformedJob(_) => "malformed_job",
            PipelineError::Catalog(_) => "catalog",
            PipelineError::Queue(_) => "queue",
        }
    }
}

impl From<QueueError> for PipelineError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::MalformedJob(msg) => PipelineError::MalformedJob(msg),
            QueueError::Json(e) => PipelineError::MalformedJob(e.to_string()),
            other => PipelineError::Queue(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_payload_errors_are_per_job() {
        let err: PipelineError = QueueError::malformed("bad base64").into();
        assert!(err.is_per_job());

        let err: PipelineError = QueueError::Full { capacity: 4 }.into();
        assert!(!err.is_per_job());
        assert_eq!(err.kind(), "queue");
    }

    #[test]
    fn test_not_found_message() {
        let err = PipelineError::NotFound(StreamKey::new("c1", "1"));
        assert_eq!(err.to_string(), "Stream not found");
    }
}
