//! Mesh telemetry library
//!
//! This crate provides the core functionality for:
//! - Building identity-annotated traffic edges between workloads
//! - Querying a Prometheus-compatible metrics backend
//! - The `Edges` wire types
//! - Health checks and observability

pub mod backend;
pub mod edges;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod proto;

pub use error::{BackendError, EdgesError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{StructuredLogger, TelemetryMetrics};
