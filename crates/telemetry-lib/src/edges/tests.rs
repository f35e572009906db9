//! End-to-end tests for the edges service
//!
//! These run the whole pipeline against an in-memory metrics backend that
//! answers every query with the same canned vector, the way a Prometheus
//! mock without query matching would.

#[cfg(test)]
mod edges_service_tests {
    use crate::backend::{async_trait, MetricsClient};
    use crate::edges::{EdgesConfig, EdgesService, PagingConfig};
    use crate::error::{BackendError, EdgesError};
    use crate::health::{components, ComponentStatus, HealthRegistry};
    use crate::models::Sample;
    use crate::proto::{self, EdgesRequest};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const WEB_ID: &str = "web.emojivoto.serviceaccount.identity.linkerd.cluster.local";
    const EMOJI_ID: &str = "emoji.emojivoto.serviceaccount.identity.linkerd.cluster.local";
    const VOTING_ID: &str = "voting.emojivoto.serviceaccount.identity.linkerd.cluster.local";

    #[derive(Default)]
    struct MockPrometheus {
        response: Vec<Sample>,
        /// Fail queries whose direction matcher has this value
        fail_direction: Option<&'static str>,
        delay: Option<Duration>,
        queries: Mutex<Vec<String>>,
    }

    impl MockPrometheus {
        fn returning(response: Vec<Sample>) -> Self {
            Self {
                response,
                ..Default::default()
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetricsClient for MockPrometheus {
        async fn query(&self, query: &str) -> Result<Vec<Sample>, BackendError> {
            self.queries.lock().unwrap().push(query.to_string());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(direction) = self.fail_direction {
                if query.contains(&format!("direction=\"{}\"", direction)) {
                    return Err(BackendError::Status {
                        status: 503,
                        body: "service unavailable".to_string(),
                    });
                }
            }

            Ok(self.response.clone())
        }
    }

    fn sample(labels: &[(&str, &str)]) -> Sample {
        Sample {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value: 123.0,
            timestamp_ms: 456,
        }
    }

    fn inbound_sample(dst: &str, client_id: &str) -> Sample {
        sample(&[
            ("deployment", dst),
            ("namespace", "emojivoto"),
            ("client_id", client_id),
        ])
    }

    fn outbound_sample(src: &str, dst: &str, server_id: &str) -> Sample {
        sample(&[
            ("deployment", src),
            ("namespace", "emojivoto"),
            ("dst_deployment", dst),
            ("dst_namespace", "emojivoto"),
            ("server_id", server_id),
        ])
    }

    /// Inbound and outbound samples mixed in one vector
    fn emojivoto_vector() -> Vec<Sample> {
        vec![
            inbound_sample("emoji", WEB_ID),
            inbound_sample("voting", WEB_ID),
            outbound_sample("web", "emoji", EMOJI_ID),
            outbound_sample("web", "voting", VOTING_ID),
        ]
    }

    fn service(client: Arc<MockPrometheus>, config: EdgesConfig) -> (EdgesService, HealthRegistry) {
        let health = HealthRegistry::new();
        (EdgesService::new(client, config, health.clone()), health)
    }

    fn deployment_edge(src: &str, dst: &str, client_id: &str, server_id: &str, msg: &str) -> proto::Edge {
        let resource = |name: &str| proto::Resource {
            namespace: "emojivoto".to_string(),
            r#type: "deployment".to_string(),
            name: name.to_string(),
        };
        proto::Edge {
            src: Some(resource(src)),
            dst: Some(resource(dst)),
            client_id: client_id.to_string(),
            server_id: server_id.to_string(),
            no_identity_msg: msg.to_string(),
        }
    }

    async fn call(service: &EdgesService, request: EdgesRequest) -> proto::EdgesResponse {
        service
            .edges(tonic::Request::new(request))
            .await
            .unwrap()
            .into_inner()
    }

    #[tokio::test]
    async fn test_emojivoto_deployment_edges() {
        let client = Arc::new(MockPrometheus::returning(emojivoto_vector()));
        let (service, health) = service(client.clone(), EdgesConfig::default());

        let rsp = call(&service, EdgesRequest::for_namespace("deployment", "emojivoto")).await;

        let ok = rsp.get_ok().expect("expected edges");
        assert_eq!(
            ok.edges,
            vec![
                deployment_edge("web", "emoji", WEB_ID, EMOJI_ID, ""),
                deployment_edge("web", "voting", WEB_ID, VOTING_ID, ""),
            ]
        );
        assert_eq!(ok.next_page_token, "");

        assert_eq!(
            client.queries().len(),
            2,
            "expected one inbound and one outbound query"
        );
        assert!(client
            .queries()
            .contains(&r#"count(response_total{direction="inbound"}) by (deployment, namespace, client_id)"#.to_string()));

        let health = health.health().await;
        assert_eq!(
            health.components[components::METRICS_BACKEND].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_missing_client_identity() {
        let client = Arc::new(MockPrometheus::returning(vec![
            inbound_sample("voting", WEB_ID),
            outbound_sample("web", "emoji", EMOJI_ID),
            outbound_sample("web", "voting", VOTING_ID),
        ]));
        let (service, _) = service(client, EdgesConfig::default());

        let rsp = call(&service, EdgesRequest::for_namespace("deployment", "emojivoto")).await;

        let edges = &rsp.get_ok().unwrap().edges;
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].client_id, "");
        assert_eq!(edges[0].server_id, EMOJI_ID);
        assert_eq!(
            edges[0].no_identity_msg,
            "No client identity observed for deployment/web.emojivoto"
        );
        assert_eq!(edges[1].no_identity_msg, "");
    }

    #[tokio::test]
    async fn test_unknown_type_never_queries_backend() {
        let client = Arc::new(MockPrometheus::returning(emojivoto_vector()));
        let (service, _) = service(client.clone(), EdgesConfig::default());

        let rsp = call(&service, EdgesRequest::for_namespace("service", "emojivoto")).await;

        assert!(rsp.get_ok().is_none());
        assert!(rsp.get_error().unwrap().contains("unsupported resource type"));
        assert!(client.queries().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_page_token_never_queries_backend() {
        let client = Arc::new(MockPrometheus::returning(emojivoto_vector()));
        let (service, _) = service(client.clone(), EdgesConfig::default());

        let mut request = EdgesRequest::for_namespace("deployment", "emojivoto");
        request.page_token = "not-a-token".to_string();
        let rsp = call(&service, request).await;

        assert_eq!(rsp.get_error(), Some("invalid page token"));
        assert!(client.queries().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_enveloped() {
        let client = Arc::new(MockPrometheus {
            response: emojivoto_vector(),
            fail_direction: Some("outbound"),
            ..Default::default()
        });
        let (service, health) = service(client, EdgesConfig::default());

        let rsp = call(&service, EdgesRequest::for_namespace("deployment", "emojivoto")).await;

        assert!(rsp.get_ok().is_none());
        let error = rsp.get_error().unwrap();
        assert!(error.starts_with("outbound query failed"), "{error}");

        let health = health.health().await;
        assert_eq!(
            health.components[components::METRICS_BACKEND].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let client = Arc::new(MockPrometheus {
            response: emojivoto_vector(),
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let (service, _) = service(client, EdgesConfig::default());

        let mut request =
            tonic::Request::new(EdgesRequest::for_namespace("deployment", "emojivoto"));
        request
            .metadata_mut()
            .insert("grpc-timeout", "50m".parse().unwrap());

        let status = service.edges(request).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_pagination_end_to_end() {
        let client = Arc::new(MockPrometheus::returning(vec![
            outbound_sample("web", "emoji", EMOJI_ID),
            outbound_sample("web", "voting", VOTING_ID),
            outbound_sample("vote-bot", "web", WEB_ID),
        ]));
        let config = EdgesConfig {
            paging: PagingConfig {
                default_page_size: 0,
                max_page_size: 2,
            },
            ..Default::default()
        };
        let (service, _) = service(client, config);

        let mut pairs = Vec::new();
        let mut token = String::new();
        let mut pages = 0;
        loop {
            let mut request = EdgesRequest::for_namespace("deploy", "emojivoto");
            request.page_token = token.clone();
            let rsp = call(&service, request).await;
            let ok = rsp.get_ok().unwrap();
            pages += 1;

            assert!(ok.edges.len() <= 2);
            pairs.extend(ok.edges.iter().map(|e| {
                (
                    e.src.as_ref().unwrap().name.clone(),
                    e.dst.as_ref().unwrap().name.clone(),
                )
            }));

            if ok.next_page_token.is_empty() {
                break;
            }
            token = ok.next_page_token.clone();
        }

        assert_eq!(pages, 2);
        assert_eq!(
            pairs,
            vec![
                ("vote-bot".to_string(), "web".to_string()),
                ("web".to_string(), "emoji".to_string()),
                ("web".to_string(), "voting".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let mut vector = emojivoto_vector();
        let client = Arc::new(MockPrometheus::returning(vector.clone()));
        let (first_service, _) = service(client, EdgesConfig::default());
        vector.reverse();
        let client = Arc::new(MockPrometheus::returning(vector));
        let (second_service, _) = service(client, EdgesConfig::default());

        let request = EdgesRequest::for_namespace("deployment", "emojivoto");
        let first = call(&first_service, request.clone()).await;
        let again = call(&first_service, request.clone()).await;
        let reversed = call(&second_service, request).await;

        assert_eq!(first, again);
        assert_eq!(first, reversed);
    }

    #[tokio::test]
    async fn test_name_filter() {
        let client = Arc::new(MockPrometheus::returning(vec![
            outbound_sample("web", "emoji", EMOJI_ID),
            outbound_sample("web", "voting", VOTING_ID),
            outbound_sample("vote-bot", "web", WEB_ID),
        ]));
        let (service, _) = service(client.clone(), EdgesConfig::default());

        let mut request = EdgesRequest::for_namespace("deployment", "emojivoto");
        if let Some(resource) = request
            .selector
            .as_mut()
            .and_then(|s| s.resource.as_mut())
        {
            resource.name = "voting".to_string();
        }
        let rsp = call(&service, request).await;

        let edges = &rsp.get_ok().unwrap().edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].dst.as_ref().unwrap().name, "voting");
        // The name never reaches the backend
        assert!(client.queries().iter().all(|q| !q.contains("voting")));
    }

    #[test]
    fn test_deadline_from_header_or_config() {
        let client = Arc::new(MockPrometheus::default());
        let config = EdgesConfig {
            query_timeout: Duration::from_secs(7),
            ..Default::default()
        };
        let (service, _) = service(client, config);

        assert_eq!(service.deadline(Some("50m")), Duration::from_millis(50));
        assert_eq!(service.deadline(Some("10s")), Duration::from_secs(7));
        assert_eq!(service.deadline(None), Duration::from_secs(7));
    }

    /// Collects formatted log output for one test
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_logged_as_error() {
        let logs = LogCapture::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let client = Arc::new(MockPrometheus::default());
        let (service, health) = service(client, EdgesConfig::default());
        health.register(components::METRICS_BACKEND).await;

        let result = Err(EdgesError::SchemaMismatch {
            inbound: "pod".to_string(),
            outbound: "deployment".to_string(),
        });
        service.record_outcome(&result).await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.contains("edges_internal_error"))
            .expect("internal error was not logged");
        assert!(line.contains("\"level\":\"ERROR\""));
        assert!(line.contains("pod"));

        // Not the backend's fault
        let health = health.health().await;
        assert_eq!(
            health.components[components::METRICS_BACKEND].status,
            ComponentStatus::Healthy
        );
    }
}
