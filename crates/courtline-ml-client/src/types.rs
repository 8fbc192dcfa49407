//! ML service request/response types.

use serde::{Deserialize, Serialize};

/// Request for ball detection on one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    /// Base64 JPEG
    pub image_b64: String,
    /// Minimum confidence for returned boxes
    pub confidence: f32,
}

/// One labelled bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub label: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in frame pixels
    pub bbox: [f32; 4],
}

impl DetectionBox {
    /// Box centre `(x, y)`.
    pub fn center(&self) -> (f32, f32) {
        let [x1, y1, x2, y2] = self.bbox;
        ((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<DetectionBox>,
}

/// Request for bounce classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BounceRequest {
    /// Min-max normalised `[x, y]` positions, oldest first
    pub window: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BounceResponse {
    pub probability: f32,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
