//! Line-calling pipeline core.
//!
//! This crate provides:
//! - Stream registry with per-stream bounce state, zones and replay buffer
//! - Frame ingestion onto the bounded frame queue
//! - Inference dispatch with single-writer routing per stream
//! - Decision fan-out to viewer rooms

pub mod bounce;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod fanout;
pub mod frame;
pub mod inference;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod replay;
pub mod stats;

pub use bounce::{normalize_window, BouncePhase, BounceTracker};
pub use catalog::{CameraCatalog, CameraStatus, CatalogSummary, InMemoryCatalog};
pub use config::WorkerConfig;
pub use error::{PipelineError, PipelineResult};
pub use executor::{InferenceExecutor, JobOutcome, WorkerContext};
pub use fanout::{FanoutHub, RoomMessage};
pub use frame::{decode_jpeg, DecodedFrame};
pub use inference::{select_ball, BallDetector, BounceClassifier, Detection};
pub use ingest::FrameIngestor;
pub use logging::StreamLogger;
pub use pipeline::Pipeline;
pub use registry::{ReplayClip, StreamHandle, StreamInfo, StreamRegistry, StreamSettings};
pub use replay::ReplayBuffer;
pub use stats::{PipelineStats, StatsSnapshot};
