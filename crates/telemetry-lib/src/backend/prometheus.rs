//! Prometheus HTTP API client
//!
//! Issues instant queries against `/api/v1/query` and decodes the vector
//! result into [`Sample`]s.

use super::{async_trait, MetricsClient};
use crate::error::BackendError;
use crate::models::Sample;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const QUERY_PATH: &str = "api/v1/query";

/// Prometheus client configuration
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Base URL of the Prometheus server (e.g., "http://prometheus:9090")
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            base_url: "http://prometheus:9090".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Instant-query client for the Prometheus HTTP API
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: reqwest::Client,
    query_url: Url,
}

impl PrometheusClient {
    pub fn new(config: PrometheusConfig) -> Result<Self, BackendError> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        // Url::join drops the last path segment unless it ends with a slash
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let query_url = base
            .join(QUERY_PATH)
            .map_err(|e| BackendError::InvalidUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, query_url })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }
}

#[async_trait]
impl MetricsClient for PrometheusClient {
    async fn query(&self, query: &str) -> Result<Vec<Sample>, BackendError> {
        debug!(query = %query, "Querying Prometheus");

        let response = self
            .client
            .get(self.query_url.clone())
            .query(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Prometheus reports bad queries as 400/422 with a JSON error body
        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(api) => api.into_samples(),
            Err(_) if !status.is_success() => Err(BackendError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(BackendError::MalformedSample(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    /// Shape depends on `result_type`; decoded once the type is checked
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    /// `[<unix seconds>, "<value>"]`
    value: (f64, String),
}

impl ApiResponse {
    fn into_samples(self) -> Result<Vec<Sample>, BackendError> {
        if self.status != "success" {
            return Err(BackendError::Api {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                error: self.error.unwrap_or_default(),
            });
        }

        let data = match self.data {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };
        if data.result_type != "vector" {
            return Err(BackendError::UnexpectedResultType(data.result_type));
        }

        let result: Vec<VectorSample> = serde_json::from_value(data.result)
            .map_err(|e| BackendError::MalformedSample(e.to_string()))?;

        // Only labels feed the join; skip samples with unparseable values
        Ok(result
            .into_iter()
            .filter_map(|sample| {
                let (timestamp, raw) = sample.value;
                match raw.parse::<f64>() {
                    Ok(value) => Some(Sample {
                        labels: sample.metric,
                        value,
                        timestamp_ms: (timestamp * 1000.0).round() as i64,
                    }),
                    Err(_) => {
                        debug!(
                            value = %raw,
                            labels = ?sample.metric,
                            "Dropping sample with non-numeric value"
                        );
                        None
                    }
                }
            })
            .collect())
    }
}

/// Builder for [`PrometheusClient`]
pub struct PrometheusClientBuilder {
    config: PrometheusConfig,
}

impl PrometheusClientBuilder {
    pub fn new() -> Self {
        Self {
            config: PrometheusConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<PrometheusClient, BackendError> {
        PrometheusClient::new(self.config)
    }
}

impl Default for PrometheusClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
