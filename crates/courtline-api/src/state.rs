//! Application state.

use std::sync::Arc;

use courtline_worker::Pipeline;

use crate::auth::{AdminGate, StaticTokenGate};
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<Pipeline>,
    pub admin_gate: Arc<dyn AdminGate>,
}

impl AppState {
    /// State with the static bearer token gate from `config.admin_token`.
    pub fn new(config: ApiConfig, pipeline: Arc<Pipeline>) -> Self {
        let admin_gate = Arc::new(StaticTokenGate::new(config.admin_token.clone()));
        Self::with_gate(config, pipeline, admin_gate)
    }

    pub fn with_gate(
        config: ApiConfig,
        pipeline: Arc<Pipeline>,
        admin_gate: Arc<dyn AdminGate>,
    ) -> Self {
        Self {
            config,
            pipeline,
            admin_gate,
        }
    }
}
