//! Structured per-stream logging.

use tracing::{info, warn, Span};

use courtline_models::StreamKey;

/// Consistent lifecycle log lines for one stream.
#[derive(Debug, Clone)]
pub struct StreamLogger {
    court_id: String,
    cam_id: String,
}

impl StreamLogger {
    pub fn new(key: &StreamKey) -> Self {
        Self {
            court_id: key.court_id.clone(),
            cam_id: key.cam_id.clone(),
        }
    }

    pub fn log_registered(&self, fps: u32) {
        info!(
            court_id = %self.court_id,
            cam_id = %self.cam_id,
            fps,
            "Stream registered"
        );
    }

    pub fn log_unregistered(&self) {
        info!(
            court_id = %self.court_id,
            cam_id = %self.cam_id,
            "Stream unregistered"
        );
    }

    pub fn log_rejected(&self, reason: &str) {
        warn!(
            court_id = %self.court_id,
            cam_id = %self.cam_id,
            "Stream rejected: {}", reason
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            court_id = %self.court_id,
            cam_id = %self.cam_id,
            "Stream warning: {}", message
        );
    }

    /// Span covering the processing of one job.
    pub fn job_span(&self) -> Span {
        tracing::info_span!(
            "stream_job",
            court_id = %self.court_id,
            cam_id = %self.cam_id
        )
    }
}
