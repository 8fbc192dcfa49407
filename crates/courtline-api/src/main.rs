//! Courtline API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use courtline_api::{create_router, metrics, ApiConfig, AppState};
use courtline_ml_client::MlClient;
use courtline_queue::QueueConfig;
use courtline_worker::{CameraCatalog, InMemoryCatalog, Pipeline, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;
    info!("Starting courtline-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let catalog = load_catalog(&config)?;

    let queue_config = QueueConfig::from_env();
    let queue = queue_config
        .connect()
        .context("failed to create frame queue")?;

    let ml = Arc::new(MlClient::from_env().context("failed to create ML client")?);
    if !ml.health_check().await.unwrap_or(false) {
        warn!(url = %ml.config().base_url, "ML service is not healthy yet");
    }

    let pipeline = Arc::new(Pipeline::new(
        WorkerConfig::from_env(),
        queue,
        catalog,
        ml.clone(),
        ml,
    ));
    let metrics_handle = metrics::start_pipeline(&pipeline, config.metrics_enabled)
        .await
        .context("failed to install metrics recorder")?;
    if metrics_handle.is_some() {
        info!("Prometheus metrics enabled at /metrics");
    }

    let state = AppState::new(config.clone(), Arc::clone(&pipeline));
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    pipeline.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON for production.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("courtline=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Catalog from `CATALOG_PATH`; outside production a missing path admits
/// every camera.
fn load_catalog(config: &ApiConfig) -> anyhow::Result<Arc<dyn CameraCatalog>> {
    match &config.catalog_path {
        Some(path) => Ok(Arc::new(InMemoryCatalog::from_file(path)?)),
        None if config.is_production() => bail!("CATALOG_PATH is required in production"),
        None => {
            warn!("CATALOG_PATH not set, accepting every camera");
            Ok(Arc::new(InMemoryCatalog::permissive()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
