//! Edge joiner
//!
//! Outbound records decide which (src, dst) pairs exist: every outbound
//! sample is a connection the source's proxy actually attempted. Inbound
//! records are only consulted through an index on the destination, to find
//! the identity the source presented when it arrived there.

use super::parse::Parsed;
use crate::error::EdgesError;
use crate::models::{Edge, InboundRecord, OutboundRecord, ResourceRef};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

/// Whether `identity` belongs to `src`.
///
/// Identities look like `<name>.<namespace>.serviceaccount.identity.<trust-domain>`;
/// only the leading component is compared against the source name.
pub fn identity_matches(identity: &str, src: &ResourceRef) -> bool {
    !src.name.is_empty() && identity.split('.').next() == Some(src.name.as_str())
}

/// Pick the identity `src` presented among those seen at its destination.
///
/// Only candidates passing [`identity_matches`] qualify. Among those, one
/// whose second component is the source namespace wins over a same-named
/// workload from another namespace; ties go to the smallest identity.
pub fn select_client_identity<'a, I>(candidates: I, src: &ResourceRef) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|id| identity_matches(id, src))
        .min_by_key(|id| (id.split('.').nth(1) != Some(src.namespace.as_str()), *id))
}

/// Join parsed query results, checking they were parsed with the same schema
pub fn join_parsed(
    inbound: &Parsed<InboundRecord>,
    outbound: &Parsed<OutboundRecord>,
) -> Result<Vec<Edge>, EdgesError> {
    if inbound.schema != outbound.schema {
        return Err(EdgesError::SchemaMismatch {
            inbound: inbound.schema.resource_type.to_string(),
            outbound: outbound.schema.resource_type.to_string(),
        });
    }
    Ok(join_edges(&inbound.records, &outbound.records))
}

/// Build one edge per distinct (src, dst) pair in `outbound`.
///
/// Edges come out in the order their pair was first seen. When a pair occurs
/// more than once, a later record replaces the earlier edge only if it
/// resolves strictly more identities.
pub fn join_edges(inbound: &[InboundRecord], outbound: &[OutboundRecord]) -> Vec<Edge> {
    // Distinct candidate identities per destination
    let mut client_ids: HashMap<&ResourceRef, BTreeSet<&str>> = HashMap::new();
    for record in inbound {
        if !record.client_identity.is_empty() {
            client_ids
                .entry(&record.dst)
                .or_default()
                .insert(record.client_identity.as_str());
        }
    }

    let mut edges: Vec<Edge> = Vec::with_capacity(outbound.len());
    let mut seen: HashMap<(&ResourceRef, &ResourceRef), usize> = HashMap::new();

    for record in outbound {
        let client_id = client_ids
            .get(&record.dst)
            .and_then(|candidates| select_client_identity(candidates.iter().copied(), &record.src))
            .map(str::to_string)
            .unwrap_or_default();

        let edge = build_edge(record, client_id);

        match seen.entry((&record.src, &record.dst)) {
            Entry::Vacant(slot) => {
                slot.insert(edges.len());
                edges.push(edge);
            }
            Entry::Occupied(slot) => {
                let existing = &mut edges[*slot.get()];
                if edge.resolved_identities() > existing.resolved_identities() {
                    *existing = edge;
                }
            }
        }
    }

    edges
}

fn build_edge(record: &OutboundRecord, client_id: String) -> Edge {
    let mut problems = Vec::new();

    if client_id.is_empty() {
        problems.push(format!("No client identity observed for {}", record.src));
    }

    let server_id = record.server_identity.clone();
    if server_id.is_empty() {
        if record.no_tls_reason.is_empty() {
            problems.push(format!("No server identity observed for {}", record.dst));
        } else {
            problems.push(format!(
                "No server identity for {}: {}",
                record.dst, record.no_tls_reason
            ));
        }
    }

    Edge {
        src: record.src.clone(),
        dst: record.dst.clone(),
        client_id,
        server_id,
        msg: problems.join("; "),
    }
}
