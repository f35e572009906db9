//! Wire types for the `Edges` RPC
//!
//! With the `proto-gen` feature these are generated from
//! `proto/telemetry/v1/edges.proto` at build time; otherwise the equivalent
//! definitions below are used so the crate builds without protoc.

#[cfg(feature = "proto-gen")]
pub mod telemetry {
    pub mod v1 {
        tonic::include_proto!("telemetry.v1");
    }
}

#[cfg(not(feature = "proto-gen"))]
pub mod telemetry {
    pub mod v1 {
        use prost::Message;
        use serde::{Deserialize, Serialize};

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct Resource {
            #[prost(string, tag = "1")]
            pub namespace: String,
            #[prost(string, tag = "2")]
            pub r#type: String,
            #[prost(string, tag = "3")]
            pub name: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct ResourceSelection {
            #[prost(message, optional, tag = "1")]
            pub resource: Option<Resource>,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct EdgesRequest {
            #[prost(message, optional, tag = "1")]
            pub selector: Option<ResourceSelection>,
            #[prost(uint32, tag = "2")]
            pub page_size: u32,
            #[prost(string, tag = "3")]
            pub page_token: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct Edge {
            #[prost(message, optional, tag = "1")]
            pub src: Option<Resource>,
            #[prost(message, optional, tag = "2")]
            pub dst: Option<Resource>,
            #[prost(string, tag = "3")]
            pub client_id: String,
            #[prost(string, tag = "4")]
            pub server_id: String,
            #[prost(string, tag = "5")]
            pub no_identity_msg: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct EdgesResponse {
            #[prost(oneof = "edges_response::Response", tags = "1, 2")]
            pub response: Option<edges_response::Response>,
        }

        pub mod edges_response {
            use serde::{Deserialize, Serialize};

            #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
            #[serde(default)]
            pub struct EdgeList {
                #[prost(message, repeated, tag = "1")]
                pub edges: Vec<super::Edge>,
                #[prost(string, tag = "2")]
                pub next_page_token: String,
            }

            #[derive(Clone, PartialEq, prost::Oneof, Serialize, Deserialize)]
            #[serde(rename_all = "snake_case")]
            pub enum Response {
                #[prost(message, tag = "1")]
                Ok(EdgeList),
                #[prost(message, tag = "2")]
                Error(super::ResponseError),
            }
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct ResponseError {
            #[prost(string, tag = "1")]
            pub error: String,
        }
    }
}

pub use telemetry::v1::edges_response::{EdgeList, Response as EdgesResult};
pub use telemetry::v1::*;

use crate::models;

impl From<&models::ResourceRef> for Resource {
    fn from(resource: &models::ResourceRef) -> Self {
        Resource {
            namespace: resource.namespace.clone(),
            r#type: resource.resource_type.as_str().to_string(),
            name: resource.name.clone(),
        }
    }
}

impl From<&models::Edge> for Edge {
    fn from(edge: &models::Edge) -> Self {
        Edge {
            src: Some(Resource::from(&edge.src)),
            dst: Some(Resource::from(&edge.dst)),
            client_id: edge.client_id.clone(),
            server_id: edge.server_id.clone(),
            no_identity_msg: edge.msg.clone(),
        }
    }
}

impl EdgesRequest {
    /// Request for every edge of `resource_type` in `namespace`
    pub fn for_namespace(resource_type: &str, namespace: &str) -> Self {
        EdgesRequest {
            selector: Some(ResourceSelection {
                resource: Some(Resource {
                    namespace: namespace.to_string(),
                    r#type: resource_type.to_string(),
                    name: String::new(),
                }),
            }),
            page_size: 0,
            page_token: String::new(),
        }
    }
}

impl EdgesResponse {
    pub fn ok(edges: Vec<Edge>, next_page_token: String) -> Self {
        EdgesResponse {
            response: Some(EdgesResult::Ok(EdgeList {
                edges,
                next_page_token,
            })),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        EdgesResponse {
            response: Some(EdgesResult::Error(ResponseError {
                error: message.into(),
            })),
        }
    }

    /// The edge list, if the request succeeded
    pub fn get_ok(&self) -> Option<&EdgeList> {
        match &self.response {
            Some(EdgesResult::Ok(list)) => Some(list),
            _ => None,
        }
    }

    /// The error message, if the request failed
    pub fn get_error(&self) -> Option<&str> {
        match &self.response {
            Some(EdgesResult::Error(err)) => Some(&err.error),
            _ => None,
        }
    }
}
