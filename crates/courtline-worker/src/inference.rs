//! Detector and classifier seams.

use async_trait::async_trait;

use courtline_ml_client::{DetectionBox, MlClient};
use courtline_models::BallPosition;

use crate::error::{PipelineError, PipelineResult};
use crate::frame::DecodedFrame;

/// One labelled detection, reduced to its centre point.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub center: BallPosition,
}

impl From<DetectionBox> for Detection {
    fn from(b: DetectionBox) -> Self {
        let (x, y) = b.center();
        Self {
            label: b.label,
            confidence: b.confidence,
            center: BallPosition::new(x as f64, y as f64),
        }
    }
}

#[async_trait]
pub trait BallDetector: Send + Sync {
    async fn detect(&self, frame: &DecodedFrame) -> PipelineResult<Vec<Detection>>;
}

#[async_trait]
pub trait BounceClassifier: Send + Sync {
    /// Probability in `[0, 1]` that the window ends in a bounce.
    async fn bounce_probability(&self, window: &[[f32; 2]]) -> PipelineResult<f32>;
}

/// Highest-confidence detection with the ball label.
///
/// Only a strictly greater confidence replaces the current pick, so the
/// first of several equal detections wins.
pub fn select_ball(detections: &[Detection], ball_class: &str) -> Option<BallPosition> {
    let mut best: Option<&Detection> = None;
    for d in detections.iter().filter(|d| d.label == ball_class) {
        match best {
            Some(b) if d.confidence <= b.confidence => {}
            _ => best = Some(d),
        }
    }
    best.map(|d| d.center)
}

#[async_trait]
impl BallDetector for MlClient {
    async fn detect(&self, frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
        let boxes = MlClient::detect(self, frame.jpeg())
            .await
            .map_err(|e| PipelineError::detection(e.to_string()))?;
        Ok(boxes.into_iter().map(Detection::from).collect())
    }
}

#[async_trait]
impl BounceClassifier for MlClient {
    async fn bounce_probability(&self, window: &[[f32; 2]]) -> PipelineResult<f32> {
        MlClient::bounce_probability(self, window)
            .await
            .map_err(|e| PipelineError::detection(format!("bounce classifier: {}", e)))
    }
}
