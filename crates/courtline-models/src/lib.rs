//! Shared data models for the courtline backend.
//!
//! This crate provides Serde-serializable types for:
//! - Stream identity (court + camera)
//! - Ball positions, verdicts and per-frame decisions
//! - Court zone polygons
//! - WebSocket message schemas for camera and viewer clients

pub mod decision;
pub mod stream;
pub mod ws;
pub mod zone;

// Re-export common types
pub use decision::{BallPosition, Decision, Verdict};
pub use stream::StreamKey;
pub use ws::{CameraRequest, ServerMessage, SetPolygonsRequest, StatusReport, ViewerRequest};
pub use zone::{CourtZones, Polygon, ZoneError};
