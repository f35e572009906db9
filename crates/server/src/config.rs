//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use telemetry_lib::edges::{EdgesConfig, PagingConfig};

/// Environment variable prefix, e.g. `TELEMETRY_API_PORT`
const ENV_PREFIX: &str = "TELEMETRY";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name reported in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Port for the edges API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Base URL of the Prometheus-compatible metrics backend
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    /// Deadline for both backend queries when a request carries none
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Page size used when a request leaves it unset; 0 returns all edges
    #[serde(default)]
    pub default_page_size: usize,

    /// Largest page any request may ask for; 0 means unbounded
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "telemetry-server".to_string())
}

fn default_api_port() -> u16 {
    8085
}

fn default_prometheus_url() -> String {
    "http://prometheus:9090".to_string()
}

fn default_query_timeout() -> u64 {
    30
}

fn default_max_page_size() -> usize {
    1000
}

impl ServerConfig {
    /// Load configuration from `TELEMETRY_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid TELEMETRY_* configuration")
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn edges_config(&self) -> EdgesConfig {
        EdgesConfig {
            query_timeout: self.query_timeout(),
            paging: PagingConfig {
                default_page_size: self.default_page_size,
                max_page_size: self.max_page_size,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_env(env(&[])).unwrap();

        assert_eq!(config.api_port, 8085);
        assert_eq!(config.prometheus_url, "http://prometheus:9090");
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.edges_config().paging.default_page_size, 0);
        assert_eq!(config.edges_config().paging.max_page_size, 1000);
    }

    #[test]
    fn test_environment_overrides() {
        let config = ServerConfig::from_env(env(&[
            ("TELEMETRY_API_PORT", "9999"),
            ("TELEMETRY_PROMETHEUS_URL", "http://localhost:9090"),
            ("TELEMETRY_QUERY_TIMEOUT_SECS", "5"),
            ("TELEMETRY_MAX_PAGE_SIZE", "50"),
        ]))
        .unwrap();

        assert_eq!(config.api_port, 9999);
        assert_eq!(config.prometheus_url, "http://localhost:9090");
        assert_eq!(config.edges_config().query_timeout, Duration::from_secs(5));
        assert_eq!(config.max_page_size, 50);
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        assert!(ServerConfig::from_env(env(&[("TELEMETRY_API_PORT", "not-a-port")])).is_err());
    }
}
