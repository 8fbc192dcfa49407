//! Prometheus metrics for the API server.
//!
//! Pipeline metrics are recorded by `courtline-worker` through the same
//! `metrics` facade and rendered by the recorder installed here.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use courtline_worker::Pipeline;

/// Install the Prometheus recorder and return a handle to render it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Start the pipeline, installing the recorder first when `enabled` so
/// worker metrics are captured from the first job.
pub async fn start_pipeline(
    pipeline: &Pipeline,
    enabled: bool,
) -> Result<Option<PrometheusHandle>, BuildError> {
    let handle = if enabled { Some(init_metrics()?) } else { None };
    pipeline.start().await;
    Ok(handle)
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "courtline_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "courtline_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "courtline_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "courtline_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "courtline_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "courtline_ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED: &str = "courtline_ws_messages_received_total";
    pub const WS_MESSAGES_LAGGED: &str = "courtline_ws_messages_lagged_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record WebSocket connection.
pub fn record_ws_connection(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_CONNECTIONS_TOTAL, &labels).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(endpoint: &str, count: i64) {
    let labels = [("endpoint", endpoint.to_string())];
    gauge!(names::WS_CONNECTIONS_ACTIVE, &labels).set(count as f64);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(endpoint: &str, message_type: &str) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("type", message_type.to_string()),
    ];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Record WebSocket message received.
pub fn record_ws_message_received(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_MESSAGES_RECEIVED, &labels).increment(1);
}

/// Record room messages a slow viewer missed.
pub fn record_ws_lagged(skipped: u64) {
    counter!(names::WS_MESSAGES_LAGGED).increment(skipped);
}

/// Metrics middleware for HTTP requests.
///
/// Installed as a route layer so the matched route template is available
/// and path parameters do not explode label cardinality.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
