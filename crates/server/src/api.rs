//! HTTP API: the `Edges` endpoint, health checks and Prometheus metrics

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use telemetry_lib::{
    edges::{EdgesService, GRPC_TIMEOUT_HEADER},
    health::{ComponentStatus, HealthRegistry},
    proto::{EdgesRequest, EdgesResponse},
};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub edges: EdgesService,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, edges: EdgesService) -> Self {
        Self {
            health_registry,
            edges,
        }
    }
}

/// `POST /api/v1/edges`
///
/// Envelope errors are still HTTP 200; only a missed deadline maps to 504.
/// The deadline can be set with a `grpc-timeout` header.
async fn edges(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<EdgesRequest>,
) -> Response {
    let deadline = state.edges.deadline(
        headers
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok()),
    );

    match state.edges.respond(&request, deadline).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(EdgesResponse::error(err.to_string())),
        )
            .into_response(),
    }
}

/// 200 while healthy or degraded, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %err, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/edges", post(edges))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
