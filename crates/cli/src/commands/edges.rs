//! `meshctl edges`

use anyhow::{bail, Result};
use tabled::Tabled;
use telemetry_lib::proto::{self, EdgesRequest, EdgesResult, Resource, ResourceSelection};

use crate::client::ApiClient;
use crate::output::{format_identity, print_rows, OutputFormat};

/// What to ask the server for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgesQuery {
    pub resource_type: String,
    pub name: Option<String>,
    /// Empty selects all namespaces
    pub namespace: String,
    /// 0 lets the server decide
    pub page_size: u32,
}

impl EdgesQuery {
    fn request(&self, page_token: String) -> EdgesRequest {
        EdgesRequest {
            selector: Some(ResourceSelection {
                resource: Some(Resource {
                    namespace: self.namespace.clone(),
                    r#type: self.resource_type.clone(),
                    name: self.name.clone().unwrap_or_default(),
                }),
            }),
            page_size: self.page_size,
            page_token,
        }
    }
}

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "SRC")]
    src: String,
    #[tabled(rename = "DST")]
    dst: String,
    #[tabled(rename = "SRC_NS")]
    src_namespace: String,
    #[tabled(rename = "DST_NS")]
    dst_namespace: String,
    #[tabled(rename = "CLIENT_ID")]
    client_id: String,
    #[tabled(rename = "SERVER_ID")]
    server_id: String,
    #[tabled(rename = "MSG")]
    msg: String,
}

impl From<&proto::Edge> for EdgeRow {
    fn from(edge: &proto::Edge) -> Self {
        let src = edge.src.clone().unwrap_or_default();
        let dst = edge.dst.clone().unwrap_or_default();
        EdgeRow {
            src: src.name,
            dst: dst.name,
            src_namespace: src.namespace,
            dst_namespace: dst.namespace,
            client_id: format_identity(&edge.client_id),
            server_id: format_identity(&edge.server_id),
            msg: edge.no_identity_msg.clone(),
        }
    }
}

/// Follow `next_page_token` until the server reports the last page
pub async fn fetch_all(client: &ApiClient, query: &EdgesQuery) -> Result<Vec<proto::Edge>> {
    let mut edges = Vec::new();
    let mut page_token = String::new();

    loop {
        let response = client.edges(&query.request(page_token.clone())).await?;
        match response.response {
            Some(EdgesResult::Ok(list)) => {
                edges.extend(list.edges);
                if list.next_page_token.is_empty() {
                    return Ok(edges);
                }
                if list.next_page_token == page_token {
                    bail!("server returned the same page token twice");
                }
                page_token = list.next_page_token;
            }
            Some(EdgesResult::Error(err)) => bail!("{}", err.error),
            None => bail!("server returned an empty response"),
        }
    }
}

pub async fn show_edges(client: &ApiClient, query: &EdgesQuery, format: OutputFormat) -> Result<()> {
    let edges = fetch_all(client, query).await?;
    let rows: Vec<EdgeRow> = edges.iter().map(EdgeRow::from).collect();
    print_rows(rows, &edges, format)
}
