//! Observability for the edges API
//!
//! Provides:
//! - Prometheus metrics (query latency, request outcomes, dropped samples,
//!   unresolved identities, edges per response)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Histogram, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// Histogram buckets for backend query latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Histogram buckets for edges per response
const EDGE_COUNT_BUCKETS: &[f64] = &[0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<TelemetryMetricsInner> = OnceLock::new();

struct TelemetryMetricsInner {
    query_duration_seconds: HistogramVec,
    requests_total: IntCounterVec,
    samples_dropped_total: IntCounterVec,
    unresolved_identities_total: IntCounterVec,
    edges_returned: Histogram,
}

impl TelemetryMetricsInner {
    fn new() -> Self {
        Self {
            query_duration_seconds: register_histogram_vec!(
                "telemetry_edges_query_duration_seconds",
                "Time spent waiting on metrics backend queries",
                &["direction"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_duration_seconds"),

            requests_total: register_int_counter_vec!(
                "telemetry_edges_requests_total",
                "Edges requests by outcome",
                &["outcome"]
            )
            .expect("Failed to register requests_total"),

            samples_dropped_total: register_int_counter_vec!(
                "telemetry_edges_samples_dropped_total",
                "Samples skipped because a required label was missing",
                &["direction"]
            )
            .expect("Failed to register samples_dropped_total"),

            unresolved_identities_total: register_int_counter_vec!(
                "telemetry_edges_unresolved_identities_total",
                "Edges returned without a confirmed identity",
                &["side"]
            )
            .expect("Failed to register unresolved_identities_total"),

            edges_returned: register_histogram!(
                "telemetry_edges_returned",
                "Number of edges in each successful response",
                EDGE_COUNT_BUCKETS.to_vec()
            )
            .expect("Failed to register edges_returned"),
        }
    }
}

/// Handle to the process-wide edges metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct TelemetryMetrics {
    _private: (),
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryMetrics {
    /// Create a handle, registering the metrics on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(TelemetryMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &TelemetryMetricsInner {
        GLOBAL_METRICS.get_or_init(TelemetryMetricsInner::new)
    }

    pub fn observe_query_duration(&self, direction: &str, duration_secs: f64) {
        self.inner()
            .query_duration_seconds
            .with_label_values(&[direction])
            .observe(duration_secs);
    }

    /// `outcome` is "ok" or an [`crate::EdgesError::kind`]
    pub fn inc_requests(&self, outcome: &str) {
        self.inner()
            .requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn add_samples_dropped(&self, direction: &str, count: usize) {
        self.inner()
            .samples_dropped_total
            .with_label_values(&[direction])
            .inc_by(count as u64);
    }

    pub fn add_unresolved_identities(&self, side: &str, count: usize) {
        self.inner()
            .unresolved_identities_total
            .with_label_values(&[side])
            .inc_by(count as u64);
    }

    pub fn observe_edges_returned(&self, count: usize) {
        self.inner().edges_returned.observe(count as f64);
    }
}

/// Structured logger for edges API events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, prometheus_url: &str) {
        info!(
            event = "server_started",
            instance = %self.instance,
            version = %version,
            prometheus_url = %prometheus_url,
            "Telemetry server started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Telemetry server shutting down"
        );
    }

    /// Log a successfully answered edges request
    pub fn log_edges_served(
        &self,
        resource_type: &str,
        namespace: &str,
        edges: usize,
        unresolved: usize,
        paged: bool,
    ) {
        info!(
            event = "edges_served",
            instance = %self.instance,
            resource_type = %resource_type,
            namespace = %namespace,
            edges = edges,
            unresolved = unresolved,
            paged = paged,
            "Served edges"
        );
    }

    /// Log samples the parser had to skip
    pub fn log_samples_dropped(
        &self,
        direction: &str,
        missing_label: &str,
        labels: &std::collections::BTreeMap<String, String>,
    ) {
        debug!(
            event = "samples_dropped",
            instance = %self.instance,
            direction = %direction,
            missing_label = %missing_label,
            labels = ?labels,
            "Dropped sample without required label"
        );
    }

    pub fn log_backend_failure(&self, direction: &str, query: &str, error: &str) {
        warn!(
            event = "backend_query_failed",
            instance = %self.instance,
            direction = %direction,
            query = %query,
            error = %error,
            "Metrics backend query failed"
        );
    }

    /// Log a failure that points at a bug rather than bad input or a bad backend
    pub fn log_internal_error(&self, error: &str) {
        error!(
            event = "edges_internal_error",
            instance = %self.instance,
            error = %error,
            "Edges request failed internally"
        );
    }

    pub fn log_request_rejected(&self, reason: &str) {
        info!(
            event = "edges_rejected",
            instance = %self.instance,
            reason = %reason,
            "Rejected edges request"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_registry() {
        let metrics = TelemetryMetrics::new();
        let other = metrics.clone();

        metrics.observe_query_duration("inbound", 0.01);
        metrics.inc_requests("ok");
        other.add_samples_dropped("outbound", 3);
        other.add_unresolved_identities("client", 1);
        other.observe_edges_returned(2);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "telemetry_edges_samples_dropped_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("telemetry-0");
        assert_eq!(logger.instance, "telemetry-0");
    }
}
