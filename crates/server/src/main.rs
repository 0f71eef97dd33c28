//! Iris predictor server
//!
//! Loads (or trains) the species model once at startup and serves predictions,
//! model information, health checks and Prometheus metrics over HTTP.

use anyhow::Result;
use iris_core::{PipelineMetrics, StructuredLogger};
use iris_server::{api, bootstrap, config::ServerConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting iris-server");

    let config = ServerConfig::load()?;
    info!(
        addr = %config.listen_addr(),
        model_path = %config.model_path.display(),
        strict_ranges = config.strict_ranges,
        "Server configured"
    );

    let logger = StructuredLogger::new("iris-server");
    let model = bootstrap::load_or_train(&config, &logger)?;
    let metadata = model.metadata().clone();

    let pipeline = config.pipeline(model)?.with_metrics(PipelineMetrics::new());

    logger.log_startup(SERVER_VERSION, pipeline.model_version());

    let state = Arc::new(api::AppState::new(Arc::new(pipeline), metadata, logger.clone()));

    let shutdown_logger = logger.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        shutdown_logger.log_shutdown("SIGINT received");
    };

    api::serve(&config.listen_addr(), state, shutdown).await?;
    info!("Shut down");

    Ok(())
}
