//! Health tracking for the telemetry server
//!
//! Backs the `/healthz` and `/readyz` endpoints. The edges service reports
//! the state of the metrics backend after every request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but recent requests failed
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix seconds of the last status change
    pub updated_at: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// The worst status of any component; healthy when there are none
    pub fn overall(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const METRICS_BACKEND: &str = "metrics_backend";
    pub const EDGES_API: &str = "edges_api";
}

/// Shared, cloneable view of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    /// Record a status, leaving the timestamp alone if nothing changed
    async fn transition(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        let unchanged = components
            .get(name)
            .map(|current| current.status == health.status && current.message == health.message)
            .unwrap_or(false);
        if !unchanged {
            components.insert(name.to_string(), health);
        }
    }

    pub async fn set_healthy(&self, name: &str) {
        self.transition(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.transition(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.transition(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::overall(&components);
        HealthResponse { status, components }
    }

    /// Ready once started, unless a component is unhealthy.
    ///
    /// A degraded metrics backend does not fail readiness: requests still get
    /// an error envelope instead of a connection refusal.
    pub async fn readiness(&self) -> ReadinessResponse {
        if !*self.ready.read().await {
            return ReadinessResponse {
                ready: false,
                reason: Some("server not yet initialized".to_string()),
            };
        }

        let components = self.components.read().await;
        match components
            .iter()
            .find(|(_, c)| c.status == ComponentStatus::Unhealthy)
        {
            Some((name, _)) => ReadinessResponse {
                ready: false,
                reason: Some(format!("{} is unhealthy", name)),
            },
            None => ReadinessResponse {
                ready: true,
                reason: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use components::{EDGES_API, METRICS_BACKEND};

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let health = HealthRegistry::new().health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let registry = HealthRegistry::new();
        registry.register(METRICS_BACKEND).await;
        registry.register(EDGES_API).await;

        registry
            .set_degraded(METRICS_BACKEND, "outbound query failed")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.set_unhealthy(EDGES_API, "stopped").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_recovery() {
        let registry = HealthRegistry::new();
        registry.set_degraded(METRICS_BACKEND, "timeout").await;
        registry.set_healthy(METRICS_BACKEND).await;

        let health = registry.health().await;
        assert_eq!(health.components[METRICS_BACKEND].status, ComponentStatus::Healthy);
        assert!(health.components[METRICS_BACKEND].message.is_none());
    }

    #[tokio::test]
    async fn test_readiness() {
        let registry = HealthRegistry::new();
        registry.register(METRICS_BACKEND).await;
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        registry.set_degraded(METRICS_BACKEND, "slow").await;
        assert!(registry.readiness().await.ready);

        registry.set_unhealthy(METRICS_BACKEND, "down").await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("metrics_backend is unhealthy"));
    }
}
