//! Edge construction from proxy traffic metrics
//!
//! An edge is a directed (source, destination) workload pair observed in
//! outbound traffic, annotated with the mTLS identities each side presented.
//! Two aggregated queries are needed: the outbound one yields the pairs and
//! the server identities, the inbound one yields the client identities seen
//! at each destination.

mod assemble;
mod join;
mod parse;
mod query;
mod service;

#[cfg(test)]
mod tests;

pub use assemble::{
    assemble, into_response, sort_edges, EdgePage, PageCursor, PageRequest, PagingConfig,
};
pub use join::{identity_matches, join_edges, join_parsed, select_client_identity};
pub use parse::{parse_inbound, parse_outbound, ParseDiagnostic, Parsed};
pub use query::{
    build_queries, parse_selector, Direction, EdgeQueries, LabelSchema, QueryDescriptor,
};
pub use service::{parse_grpc_timeout, EdgesConfig, EdgesService, GRPC_TIMEOUT_HEADER};
