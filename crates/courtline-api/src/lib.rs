//! Axum HTTP/WebSocket server for the line-calling pipeline.
//!
//! This crate provides:
//! - Camera and viewer WebSocket endpoints
//! - Health, status and admin HTTP routes
//! - Security headers, request ids and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use auth::{AdminGate, StaticTokenGate};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
