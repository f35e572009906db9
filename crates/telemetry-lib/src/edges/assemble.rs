//! Response assembly: ordering, name filtering, and pagination

use crate::error::EdgesError;
use crate::models::{Edge, ResourceRef, Selector};
use crate::proto;
use serde::{Deserialize, Serialize};

/// Page size limits applied to every request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingConfig {
    /// Used when the request does not set a page size; 0 returns everything
    pub default_page_size: usize,
    /// Upper bound on any page; 0 means unbounded
    pub max_page_size: usize,
}

/// Position after which the next page starts.
///
/// Encoded as the sort key of the last edge on the previous page, so a page
/// boundary does not move when the edge set is unchanged between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub src: ResourceRef,
    pub dst: ResourceRef,
}

impl PageCursor {
    fn after(edge: &Edge) -> Self {
        Self {
            src: edge.src.clone(),
            dst: edge.dst.clone(),
        }
    }

    pub fn encode(&self) -> String {
        // Serializing plain strings and enums cannot fail
        hex::encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(token: &str) -> Result<Self, EdgesError> {
        let bytes = hex::decode(token).map_err(|_| EdgesError::InvalidPageToken)?;
        serde_json::from_slice(&bytes).map_err(|_| EdgesError::InvalidPageToken)
    }
}

/// Which slice of the ordered edge list to return
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// 0 returns all remaining edges
    pub page_size: usize,
    pub after: Option<PageCursor>,
}

impl PageRequest {
    /// Resolve the requested page size and token against the configured limits
    pub fn resolve(page_size: u32, page_token: &str, config: &PagingConfig) -> Result<Self, EdgesError> {
        let requested = match page_size as usize {
            0 => config.default_page_size,
            n => n,
        };
        let page_size = match (requested, config.max_page_size) {
            (n, 0) => n,
            (0, max) => max,
            (n, max) => n.min(max),
        };

        let after = if page_token.is_empty() {
            None
        } else {
            Some(PageCursor::decode(page_token)?)
        };

        Ok(Self { page_size, after })
    }
}

/// One page of edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgePage {
    pub edges: Vec<Edge>,
    pub next: Option<PageCursor>,
}

impl EdgePage {
    pub fn into_response(self) -> proto::EdgesResponse {
        let edges = self.edges.iter().map(proto::Edge::from).collect();
        let next_page_token = self.next.map(|c| c.encode()).unwrap_or_default();
        proto::EdgesResponse::ok(edges, next_page_token)
    }
}

fn sort_key(edge: &Edge) -> (&ResourceRef, &ResourceRef) {
    (&edge.src, &edge.dst)
}

/// Sort by (src, dst) and drop repeated pairs, keeping the better resolved one
pub fn sort_edges(edges: &mut Vec<Edge>) {
    // Stable, so equally resolved duplicates keep the first-seen entry
    edges.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    edges.dedup_by(|later, kept| {
        if sort_key(later) != sort_key(kept) {
            return false;
        }
        if later.resolved_identities() > kept.resolved_identities() {
            std::mem::swap(later, kept);
        }
        true
    });
}

fn selects(selector: &Selector, name: &str, resource: &ResourceRef) -> bool {
    resource.name == name
        && (selector.namespace.is_empty() || resource.namespace == selector.namespace)
}

/// Order, filter, and page the joined edges for `selector`
pub fn assemble(mut edges: Vec<Edge>, selector: &Selector, page: &PageRequest) -> EdgePage {
    if let Some(name) = &selector.name {
        edges.retain(|e| selects(selector, name, &e.src) || selects(selector, name, &e.dst));
    }

    sort_edges(&mut edges);

    let start = match &page.after {
        Some(cursor) => edges.partition_point(|e| sort_key(e) <= (&cursor.src, &cursor.dst)),
        None => 0,
    };
    let mut edges = edges.split_off(start);

    let next = if page.page_size > 0 && edges.len() > page.page_size {
        edges.truncate(page.page_size);
        edges.last().map(PageCursor::after)
    } else {
        None
    };

    EdgePage { edges, next }
}

/// Wrap the outcome of a request into the response envelope
pub fn into_response(result: Result<EdgePage, EdgesError>) -> proto::EdgesResponse {
    match result {
        Ok(page) => page.into_response(),
        Err(err) => proto::EdgesResponse::error(err.to_string()),
    }
}
