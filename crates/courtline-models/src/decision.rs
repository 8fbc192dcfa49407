//! Ball positions, verdicts and per-frame decisions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::StreamKey;

/// Ball position in frame pixel coordinates.
///
/// Serialized as a two-element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct BallPosition {
    pub x: f64,
    pub y: f64,
}

impl BallPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for BallPosition {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<BallPosition> for (f64, f64) {
    fn from(p: BallPosition) -> Self {
        (p.x, p.y)
    }
}

/// In/out call for the most recent bounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Ball landed inside a court zone
    In,
    /// Ball landed outside every court zone
    Out,
    /// Not enough trajectory data yet
    #[default]
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::In => "IN",
            Verdict::Out => "OUT",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of processing one frame, published to every viewer of the camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(flatten)]
    pub stream: StreamKey,
    /// Ball position detected in this frame, if any
    pub ball_xy: Option<BallPosition>,
    pub verdict: Verdict,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    pub fn new(stream: StreamKey, ball_xy: Option<BallPosition>, verdict: Verdict) -> Self {
        Self {
            stream,
            ball_xy,
            verdict,
            timestamp: Utc::now(),
        }
    }
}
