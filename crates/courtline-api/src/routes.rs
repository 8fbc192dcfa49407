//! API routes.

use axum::middleware;
use axum::routing::{delete, get};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{health, list_streams, status, unregister_stream};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;
use crate::ws::{ws_camera, ws_viewer};

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let admin_routes = Router::new()
        .route("/admin/streams", get(list_streams))
        .route("/admin/streams/:court_id/:cam_id", delete(unregister_stream));

    let ws_routes = Router::new()
        .route("/ws/camera", get(ws_camera))
        .route("/ws/viewer", get(ws_viewer));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/status", get(status));

    let app_routes = Router::new()
        .merge(admin_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .route_layer(middleware::from_fn(metrics_middleware));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(app_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
