//! Client for the ML inference services.
//!
//! The ball detector and the bounce classifier run as an HTTP service next
//! to the pipeline. This crate wraps its endpoints:
//! - `POST /detect`: labelled boxes for one JPEG frame
//! - `POST /bounce`: bounce probability for a normalised position window
//! - `GET /health`

pub mod client;
pub mod error;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{BounceRequest, BounceResponse, DetectRequest, DetectResponse, DetectionBox};
