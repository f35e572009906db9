//! Telemetry server
//!
//! Serves identity-annotated traffic edges built from the mesh's Prometheus
//! metrics.

use anyhow::{Context, Result};
use std::sync::Arc;
use telemetry_lib::{
    backend::PrometheusClientBuilder,
    edges::EdgesService,
    health::{components, HealthRegistry},
    observability::StructuredLogger,
};
use telemetry_server::{api, config::ServerConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServerConfig::load()?;
    info!(
        instance = %config.instance,
        api_port = config.api_port,
        query_timeout_secs = config.query_timeout_secs,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::METRICS_BACKEND).await;
    health_registry.register(components::EDGES_API).await;

    let client = PrometheusClientBuilder::new()
        .base_url(config.prometheus_url.clone())
        .request_timeout(config.query_timeout())
        .build()
        .context("Failed to create Prometheus client")?;

    let logger = StructuredLogger::new(&config.instance);
    let edges = EdgesService::new(
        Arc::new(client),
        config.edges_config(),
        health_registry.clone(),
    )
    .with_logger(logger.clone());

    let state = Arc::new(api::AppState::new(health_registry.clone(), edges));
    let mut api_handle = tokio::spawn(api::serve(config.api_port, state));

    health_registry.set_ready(true).await;
    logger.log_startup(SERVER_VERSION, &config.prometheus_url);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
        result = &mut api_handle => {
            health_registry
                .set_unhealthy(components::EDGES_API, "API server stopped")
                .await;
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server exited"),
                Ok(Err(err)) => {
                    error!(error = %err, "API server failed");
                    return Err(err);
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context("API server task panicked"))
                }
            }
        }
    }

    health_registry.set_ready(false).await;
    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
