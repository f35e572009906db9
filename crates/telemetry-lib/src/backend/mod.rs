//! Metrics backend access
//!
//! The edges pipeline only depends on the [`MetricsClient`] trait; the
//! Prometheus HTTP implementation lives in [`prometheus`].

mod prometheus;

pub use self::prometheus::{PrometheusClient, PrometheusClientBuilder};

use crate::error::BackendError;
use crate::models::Sample;

pub use async_trait::async_trait;

/// Executes instant queries against a time-series backend
#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Run `query` and return the resulting instant vector, in no particular order
    async fn query(&self, query: &str) -> Result<Vec<Sample>, BackendError>;
}
