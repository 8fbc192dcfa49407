//! Job types for the queue.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courtline_models::StreamKey;

use crate::error::{QueueError, QueueResult};

/// One encoded frame waiting for inference.
///
/// Immutable once built; cloning only bumps the frame's reference count.
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub stream: StreamKey,
    /// JPEG bytes as received from the camera
    pub frame: Arc<[u8]>,
    pub enqueued_at: DateTime<Utc>,
}

impl FrameJob {
    pub fn new(stream: StreamKey, frame: impl Into<Arc<[u8]>>) -> Self {
        Self {
            stream,
            frame: frame.into(),
            enqueued_at: Utc::now(),
        }
    }

    /// Build a job from a base64 JPEG as sent by camera clients.
    pub fn from_base64(stream: StreamKey, frame_b64: &str) -> QueueResult<Self> {
        let bytes = decode_frame(frame_b64)?;
        Ok(Self::new(stream, bytes))
    }

    /// Persisted form placed on shared queues.
    pub fn to_envelope(&self) -> JobEnvelope {
        JobEnvelope {
            court_id: self.stream.court_id.clone(),
            cam_id: self.stream.cam_id.clone(),
            frame_b64: STANDARD.encode(&self.frame),
            timestamp: self.enqueued_at.timestamp_micros() as f64 / 1_000_000.0,
        }
    }

    /// Validate a persisted envelope. Any shape problem is a `MalformedJob`.
    pub fn from_envelope(envelope: JobEnvelope) -> QueueResult<Self> {
        if envelope.court_id.is_empty() || envelope.cam_id.is_empty() {
            return Err(QueueError::malformed("empty court_id or cam_id"));
        }
        if !envelope.timestamp.is_finite() || envelope.timestamp < 0.0 {
            return Err(QueueError::malformed(format!(
                "invalid timestamp {}",
                envelope.timestamp
            )));
        }

        let frame = decode_frame(&envelope.frame_b64)?;
        let micros = (envelope.timestamp * 1_000_000.0).round() as i64;
        let enqueued_at = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| QueueError::malformed("timestamp out of range"))?;

        Ok(Self {
            stream: StreamKey::new(envelope.court_id, envelope.cam_id),
            frame: frame.into(),
            enqueued_at,
        })
    }

    /// Parse a JSON payload read from a shared queue.
    pub fn from_json(payload: &str) -> QueueResult<Self> {
        let envelope: JobEnvelope = serde_json::from_str(payload)
            .map_err(|e| QueueError::malformed(format!("invalid job payload: {}", e)))?;
        Self::from_envelope(envelope)
    }

    pub fn to_json(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(&self.to_envelope())?)
    }
}

fn decode_frame(frame_b64: &str) -> QueueResult<Vec<u8>> {
    let bytes = STANDARD
        .decode(frame_b64.trim())
        .map_err(|e| QueueError::malformed(format!("frame is not valid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(QueueError::malformed("empty frame"));
    }
    Ok(bytes)
}

/// Wire format of a queued job: `{court_id, cam_id, frame_b64, timestamp}`.
///
/// `timestamp` is seconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub court_id: String,
    pub cam_id: String,
    pub frame_b64: String,
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_keeps_stream_and_time() {
        let job = FrameJob::new(StreamKey::new("c1", "2"), vec![0xFF, 0xD8, 0xFF]);
        let restored = FrameJob::from_json(&job.to_json().unwrap()).unwrap();

        assert_eq!(restored.stream, job.stream);
        assert_eq!(&*restored.frame, &*job.frame);
        assert_eq!(
            restored.enqueued_at.timestamp_millis(),
            job.enqueued_at.timestamp_millis()
        );
    }

    #[test]
    fn test_rejects_bad_base64() {
        let err = FrameJob::from_base64(StreamKey::new("c1", "2"), "not base64!!").unwrap_err();
        assert!(matches!(err, QueueError::MalformedJob(_)));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let err = FrameJob::from_json(r#"{"court_id":"c1","frame_b64":"AAAA"}"#).unwrap_err();
        assert!(err.is_per_job());
    }

    #[test]
    fn test_rejects_empty_ids() {
        let envelope = JobEnvelope {
            court_id: String::new(),
            cam_id: "1".to_string(),
            frame_b64: "AAAA".to_string(),
            timestamp: 1.0,
        };
        assert!(FrameJob::from_envelope(envelope).is_err());
    }
}
