//! Core data models for the edges pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::EdgesError;

/// Workload resource types that carry traffic labels.
///
/// Each variant maps to exactly one Prometheus label name through
/// [`ResourceType::label`]; label names are never derived from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    DaemonSet,
    Deployment,
    Job,
    Pod,
    ReplicaSet,
    ReplicationController,
    StatefulSet,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        ResourceType::DaemonSet,
        ResourceType::Deployment,
        ResourceType::Job,
        ResourceType::Pod,
        ResourceType::ReplicaSet,
        ResourceType::ReplicationController,
        ResourceType::StatefulSet,
    ];

    /// Canonical Kubernetes name, as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::DaemonSet => "daemonset",
            ResourceType::Deployment => "deployment",
            ResourceType::Job => "job",
            ResourceType::Pod => "pod",
            ResourceType::ReplicaSet => "replicaset",
            ResourceType::ReplicationController => "replicationcontroller",
            ResourceType::StatefulSet => "statefulset",
        }
    }

    /// Name of the metric label holding a resource of this type
    pub fn label(&self) -> &'static str {
        match self {
            ResourceType::DaemonSet => "daemonset",
            ResourceType::Deployment => "deployment",
            ResourceType::Job => "k8s_job",
            ResourceType::Pod => "pod",
            ResourceType::ReplicaSet => "replicaset",
            ResourceType::ReplicationController => "replicationcontroller",
            ResourceType::StatefulSet => "statefulset",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = EdgesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daemonset" | "daemonsets" | "ds" => Ok(ResourceType::DaemonSet),
            "deployment" | "deployments" | "deploy" => Ok(ResourceType::Deployment),
            "job" | "jobs" => Ok(ResourceType::Job),
            "pod" | "pods" | "po" => Ok(ResourceType::Pod),
            "replicaset" | "replicasets" | "rs" => Ok(ResourceType::ReplicaSet),
            "replicationcontroller" | "replicationcontrollers" | "rc" => {
                Ok(ResourceType::ReplicationController)
            }
            "statefulset" | "statefulsets" | "sts" => Ok(ResourceType::StatefulSet),
            _ => Err(EdgesError::InvalidSelector {
                reason: format!("unsupported resource type \"{}\"", s),
            }),
        }
    }
}

/// One workload resource.
///
/// Ordering is by namespace, then type, then name; the response ordering
/// relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub namespace: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub name: String,
}

impl ResourceRef {
    pub fn new(
        namespace: impl Into<String>,
        resource_type: ResourceType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            resource_type,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.resource_type, self.name, self.namespace)
    }
}

/// Validated request selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub resource_type: ResourceType,
    /// Empty selects every namespace
    pub namespace: String,
    pub name: Option<String>,
}

/// A single instant-vector sample returned by the metrics backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl Sample {
    /// Label value, treating an empty value the same as an absent label
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// A caller identity observed at a destination's inbound proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    pub dst: ResourceRef,
    pub client_identity: String,
}

/// A connection observed at a source's outbound proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub src: ResourceRef,
    pub dst: ResourceRef,
    pub server_identity: String,
    /// Why the proxy did not establish mTLS, when it reported a reason
    pub no_tls_reason: String,
}

/// One directed traffic relationship with the identities each side presented
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src: ResourceRef,
    pub dst: ResourceRef,
    pub client_id: String,
    pub server_id: String,
    pub msg: String,
}

impl Edge {
    /// Number of identity fields that resolved (0 to 2)
    pub fn resolved_identities(&self) -> usize {
        usize::from(!self.client_id.is_empty()) + usize::from(!self.server_id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_aliases() {
        assert_eq!("deploy".parse::<ResourceType>().unwrap(), ResourceType::Deployment);
        assert_eq!("Deployments".parse::<ResourceType>().unwrap(), ResourceType::Deployment);
        assert_eq!("sts".parse::<ResourceType>().unwrap(), ResourceType::StatefulSet);
        assert_eq!("po".parse::<ResourceType>().unwrap(), ResourceType::Pod);
    }

    #[test]
    fn test_unknown_resource_type_rejected() {
        let err = "service".parse::<ResourceType>().unwrap_err();
        assert!(matches!(err, EdgesError::InvalidSelector { .. }));
    }

    #[test]
    fn test_label_table() {
        assert_eq!(ResourceType::Deployment.label(), "deployment");
        assert_eq!(ResourceType::Job.label(), "k8s_job");
        for ty in ResourceType::ALL {
            assert_eq!(ty.as_str().parse::<ResourceType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_empty_label_value_is_absent() {
        let sample = Sample {
            labels: BTreeMap::from([
                ("client_id".to_string(), String::new()),
                ("namespace".to_string(), "emojivoto".to_string()),
            ]),
            value: 1.0,
            timestamp_ms: 0,
        };
        assert_eq!(sample.label("client_id"), None);
        assert_eq!(sample.label("namespace"), Some("emojivoto"));
    }

    #[test]
    fn test_resource_ordering() {
        let a = ResourceRef::new("a", ResourceType::Deployment, "zeta");
        let b = ResourceRef::new("b", ResourceType::Deployment, "alpha");
        assert!(a < b);
    }
}
