//! Query construction for the inbound and outbound identity queries

use crate::error::EdgesError;
use crate::models::{ResourceType, Selector};
use crate::proto;

/// Counter aggregated by both queries
const RESPONSE_METRIC: &str = "response_total";

pub const NAMESPACE_LABEL: &str = "namespace";
pub const DST_NAMESPACE_LABEL: &str = "dst_namespace";
pub const CLIENT_ID_LABEL: &str = "client_id";
pub const SERVER_ID_LABEL: &str = "server_id";
pub const NO_TLS_REASON_LABEL: &str = "no_tls_reason";

/// Maximum length of a Kubernetes DNS-1123 subdomain name
const MAX_NAME_LEN: usize = 253;

/// Label names used by both queries for one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSchema {
    pub resource_type: ResourceType,
    pub resource_label: &'static str,
    pub dst_resource_label: &'static str,
}

impl LabelSchema {
    pub fn for_type(resource_type: ResourceType) -> Self {
        // One static `dst_` label per entry keeps every label name out of format!()
        let dst_resource_label = match resource_type {
            ResourceType::DaemonSet => "dst_daemonset",
            ResourceType::Deployment => "dst_deployment",
            ResourceType::Job => "dst_k8s_job",
            ResourceType::Pod => "dst_pod",
            ResourceType::ReplicaSet => "dst_replicaset",
            ResourceType::ReplicationController => "dst_replicationcontroller",
            ResourceType::StatefulSet => "dst_statefulset",
        };
        Self {
            resource_type,
            resource_label: resource_type.label(),
            dst_resource_label,
        }
    }
}

/// Which side of a proxied connection a query observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// A query string together with the schema its samples are parsed against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub direction: Direction,
    pub schema: LabelSchema,
    pub query: String,
}

/// The pair of queries issued for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeQueries {
    pub inbound: QueryDescriptor,
    pub outbound: QueryDescriptor,
}

/// Validate the wire selector
pub fn parse_selector(selection: Option<&proto::ResourceSelection>) -> Result<Selector, EdgesError> {
    let resource = selection
        .and_then(|s| s.resource.as_ref())
        .ok_or_else(|| EdgesError::InvalidSelector {
            reason: "a resource selection is required".to_string(),
        })?;

    let resource_type: ResourceType = resource.r#type.parse()?;

    if !resource.namespace.is_empty() {
        validate_name("namespace", &resource.namespace)?;
    }
    let name = if resource.name.is_empty() {
        None
    } else {
        validate_name("resource name", &resource.name)?;
        Some(resource.name.clone())
    };

    Ok(Selector {
        resource_type,
        namespace: resource.namespace.clone(),
        name,
    })
}

fn validate_name(what: &str, value: &str) -> Result<(), EdgesError> {
    let valid_chars = value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.');
    let valid_ends = value
        .bytes()
        .next()
        .zip(value.bytes().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);

    if valid_chars && valid_ends && value.len() <= MAX_NAME_LEN {
        Ok(())
    } else {
        Err(EdgesError::InvalidSelector {
            reason: format!("{} \"{}\" is not a valid Kubernetes name", what, value),
        })
    }
}

/// Build the inbound and outbound identity queries for a selector.
///
/// The resource name is not part of either query: the name filter applies to
/// both ends of an edge and is evaluated after the join.
pub fn build_queries(selector: &Selector) -> EdgeQueries {
    let schema = LabelSchema::for_type(selector.resource_type);

    // Not namespace-filtered so destinations outside the selected namespace
    // still contribute caller identities
    let inbound_matchers = vec![label_matcher("direction", Direction::Inbound.as_str())];
    let inbound = QueryDescriptor {
        direction: Direction::Inbound,
        schema,
        query: aggregate(
            &inbound_matchers,
            &[schema.resource_label, NAMESPACE_LABEL, CLIENT_ID_LABEL],
        ),
    };

    let mut outbound_matchers = vec![label_matcher("direction", Direction::Outbound.as_str())];
    if !selector.namespace.is_empty() {
        outbound_matchers.push(label_matcher(NAMESPACE_LABEL, &selector.namespace));
    }
    let outbound = QueryDescriptor {
        direction: Direction::Outbound,
        schema,
        query: aggregate(
            &outbound_matchers,
            &[
                schema.resource_label,
                NAMESPACE_LABEL,
                schema.dst_resource_label,
                DST_NAMESPACE_LABEL,
                SERVER_ID_LABEL,
                NO_TLS_REASON_LABEL,
            ],
        ),
    };

    EdgeQueries { inbound, outbound }
}

fn aggregate(matchers: &[String], by: &[&str]) -> String {
    format!(
        "count({}{{{}}}) by ({})",
        RESPONSE_METRIC,
        matchers.join(", "),
        by.join(", ")
    )
}

fn label_matcher(label: &'static str, value: &str) -> String {
    format!("{}=\"{}\"", label, escape_label_value(value))
}

/// Escape a value for use inside a double-quoted PromQL string
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}
