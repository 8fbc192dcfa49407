//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_INGESTED_TOTAL: &str = "courtline_frames_ingested_total";
    pub const JOBS_ENQUEUED_TOTAL: &str = "courtline_jobs_enqueued_total";
    pub const JOBS_EVICTED_TOTAL: &str = "courtline_jobs_evicted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "courtline_jobs_rejected_total";

    pub const JOBS_PROCESSED_TOTAL: &str = "courtline_jobs_processed_total";
    pub const JOBS_FAILED_TOTAL: &str = "courtline_jobs_failed_total";
    pub const JOBS_DROPPED_TOTAL: &str = "courtline_jobs_dropped_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "courtline_inference_duration_seconds";

    pub const DECISIONS_PUBLISHED_TOTAL: &str = "courtline_decisions_published_total";
    pub const ACTIVE_STREAMS: &str = "courtline_active_streams";
    pub const QUEUE_DEPTH: &str = "courtline_queue_depth";
}

/// Record a frame accepted or refused at ingestion.
pub fn record_frame_ingested(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::FRAMES_INGESTED_TOTAL, &labels).increment(1);
}

pub fn record_job_enqueued(evicted: usize) {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
    if evicted > 0 {
        counter!(names::JOBS_EVICTED_TOTAL).increment(evicted as u64);
    }
}

pub fn record_job_rejected() {
    counter!(names::JOBS_REJECTED_TOTAL).increment(1);
}

pub fn record_job_processed(duration_secs: f64) {
    counter!(names::JOBS_PROCESSED_TOTAL).increment(1);
    histogram!(names::INFERENCE_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_dropped(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_DROPPED_TOTAL, &labels).increment(1);
}

pub fn record_decision_published(verdict: &str) {
    let labels = [("verdict", verdict.to_string())];
    counter!(names::DECISIONS_PUBLISHED_TOTAL, &labels).increment(1);
}

pub fn set_active_streams(count: usize) {
    gauge!(names::ACTIVE_STREAMS).set(count as f64);
}

pub fn set_queue_depth(depth: usize) {
    gauge!(names::QUEUE_DEPTH).set(depth as f64);
}
