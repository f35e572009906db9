//! Edges request orchestration
//!
//! validate -> build queries -> run both under one deadline -> parse -> join
//! -> assemble

use super::assemble::{assemble, into_response, EdgePage, PageRequest, PagingConfig};
use super::join::join_parsed;
use super::parse::{parse_inbound, parse_outbound, ParseDiagnostic};
use super::query::{build_queries, parse_selector, QueryDescriptor};
use crate::backend::MetricsClient;
use crate::error::EdgesError;
use crate::health::{components, HealthRegistry};
use crate::models::{Edge, Sample};
use crate::observability::{StructuredLogger, TelemetryMetrics};
use crate::proto::{EdgesRequest, EdgesResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Metadata key carrying the caller's deadline
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Service settings
#[derive(Debug, Clone)]
pub struct EdgesConfig {
    /// Deadline for both backend queries when the caller sets none
    pub query_timeout: Duration,
    pub paging: PagingConfig,
}

impl Default for EdgesConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
            paging: PagingConfig::default(),
        }
    }
}

/// Parse a gRPC `grpc-timeout` value: up to 8 digits followed by a unit
/// (`H`, `M`, `S`, `m`, `u`, `n`)
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let unit = value.chars().last()?;
    let digits = &value[..value.len() - unit.len_utf8()];
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        'H' => Some(Duration::from_secs(amount * 3600)),
        'M' => Some(Duration::from_secs(amount * 60)),
        'S' => Some(Duration::from_secs(amount)),
        'm' => Some(Duration::from_millis(amount)),
        'u' => Some(Duration::from_micros(amount)),
        'n' => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

/// Answers `Edges` requests against a metrics backend
#[derive(Clone)]
pub struct EdgesService {
    client: Arc<dyn MetricsClient>,
    config: EdgesConfig,
    health: HealthRegistry,
    metrics: TelemetryMetrics,
    logger: StructuredLogger,
}

impl EdgesService {
    pub fn new(client: Arc<dyn MetricsClient>, config: EdgesConfig, health: HealthRegistry) -> Self {
        Self {
            client,
            config,
            health,
            metrics: TelemetryMetrics::new(),
            logger: StructuredLogger::new("edges"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Deadline from a `grpc-timeout` value, falling back to the configured
    /// query timeout when it is absent or malformed
    pub fn deadline(&self, grpc_timeout: Option<&str>) -> Duration {
        grpc_timeout
            .and_then(parse_grpc_timeout)
            .unwrap_or(self.config.query_timeout)
    }

    /// Unary RPC handler.
    ///
    /// Invalid requests and backend failures come back inside the response
    /// envelope; only a missed deadline is reported as a status.
    pub async fn edges(
        &self,
        request: tonic::Request<EdgesRequest>,
    ) -> Result<tonic::Response<EdgesResponse>, tonic::Status> {
        let deadline = self.deadline(
            request
                .metadata()
                .get(GRPC_TIMEOUT_HEADER)
                .and_then(|v| v.to_str().ok()),
        );

        let response = self.respond(request.get_ref(), deadline).await?;
        Ok(tonic::Response::new(response))
    }

    /// Build the response envelope, failing only with
    /// [`EdgesError::DeadlineExceeded`]
    pub async fn respond(
        &self,
        request: &EdgesRequest,
        deadline: Duration,
    ) -> Result<EdgesResponse, EdgesError> {
        match self.query_edges(request, deadline).await {
            Err(err @ EdgesError::DeadlineExceeded(_)) => Err(err),
            result => Ok(into_response(result)),
        }
    }

    /// Run one request and record its outcome
    pub async fn query_edges(
        &self,
        request: &EdgesRequest,
        deadline: Duration,
    ) -> Result<EdgePage, EdgesError> {
        let result = self.run(request, deadline).await;
        self.record_outcome(&result).await;
        result
    }

    /// Count the outcome and report it to health or the logs
    pub(super) async fn record_outcome(&self, result: &Result<EdgePage, EdgesError>) {
        match result {
            Ok(_) => {
                self.metrics.inc_requests("ok");
                self.health.set_healthy(components::METRICS_BACKEND).await;
            }
            Err(err) => {
                self.metrics.inc_requests(err.kind());
                match err {
                    EdgesError::Backend { .. } | EdgesError::DeadlineExceeded(_) => {
                        self.health
                            .set_degraded(components::METRICS_BACKEND, err.to_string())
                            .await;
                    }
                    EdgesError::InvalidSelector { .. } | EdgesError::InvalidPageToken => {
                        self.logger.log_request_rejected(&err.to_string());
                    }
                    EdgesError::SchemaMismatch { .. } => {
                        self.logger.log_internal_error(&err.to_string());
                    }
                }
            }
        }
    }

    async fn run(&self, request: &EdgesRequest, deadline: Duration) -> Result<EdgePage, EdgesError> {
        // Both checks happen before the backend sees anything
        let selector = parse_selector(request.selector.as_ref())?;
        let page_request =
            PageRequest::resolve(request.page_size, &request.page_token, &self.config.paging)?;

        let queries = build_queries(&selector);

        let (inbound, outbound) = tokio::time::timeout(deadline, async {
            tokio::try_join!(self.fetch(&queries.inbound), self.fetch(&queries.outbound))
        })
        .await
        .map_err(|_| EdgesError::DeadlineExceeded(deadline))??;

        let inbound = parse_inbound(&inbound, queries.inbound.schema);
        let outbound = parse_outbound(&outbound, queries.outbound.schema);
        self.report_dropped(&inbound.dropped);
        self.report_dropped(&outbound.dropped);

        let edges = join_parsed(&inbound, &outbound)?;
        let page = assemble(edges, &selector, &page_request);

        let unresolved = self.report_unresolved(&page.edges);
        self.metrics.observe_edges_returned(page.edges.len());
        self.logger.log_edges_served(
            selector.resource_type.as_str(),
            &selector.namespace,
            page.edges.len(),
            unresolved,
            page.next.is_some(),
        );

        Ok(page)
    }

    async fn fetch(&self, descriptor: &QueryDescriptor) -> Result<Vec<Sample>, EdgesError> {
        let direction = descriptor.direction.as_str();
        debug!(direction = %direction, query = %descriptor.query, "Querying metrics backend");

        let start = Instant::now();
        let result = self.client.query(&descriptor.query).await;
        self.metrics
            .observe_query_duration(direction, start.elapsed().as_secs_f64());

        result.map_err(|source| {
            self.logger
                .log_backend_failure(direction, &descriptor.query, &source.to_string());
            EdgesError::Backend { direction, source }
        })
    }

    fn report_dropped(&self, dropped: &[ParseDiagnostic]) {
        for diagnostic in dropped {
            self.logger.log_samples_dropped(
                diagnostic.direction.as_str(),
                diagnostic.missing_label,
                &diagnostic.labels,
            );
        }
        if let Some(first) = dropped.first() {
            self.metrics
                .add_samples_dropped(first.direction.as_str(), dropped.len());
        }
    }

    /// Count edges lacking an identity; returns the number of affected edges
    fn report_unresolved(&self, edges: &[Edge]) -> usize {
        let missing_client = edges.iter().filter(|e| e.client_id.is_empty()).count();
        let missing_server = edges.iter().filter(|e| e.server_id.is_empty()).count();
        if missing_client > 0 {
            self.metrics.add_unresolved_identities("client", missing_client);
        }
        if missing_server > 0 {
            self.metrics.add_unresolved_identities("server", missing_server);
        }
        edges.iter().filter(|e| !e.msg.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::parse_grpc_timeout;
    use std::time::Duration;

    #[test]
    fn test_units() {
        assert_eq!(parse_grpc_timeout("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_grpc_timeout("3M"), Some(Duration::from_secs(180)));
        assert_eq!(parse_grpc_timeout("10S"), Some(Duration::from_secs(10)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("7u"), Some(Duration::from_micros(7)));
        assert_eq!(parse_grpc_timeout("99n"), Some(Duration::from_nanos(99)));
    }

    #[test]
    fn test_rejects_malformed() {
        for value in ["", "S", "10", "10s", "123456789S", "-1S", "1.5S", "10é"] {
            assert_eq!(parse_grpc_timeout(value), None, "{value}");
        }
    }
}
