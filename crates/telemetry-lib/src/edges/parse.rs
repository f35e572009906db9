//! Conversion of raw query samples into typed records
//!
//! Samples without the labels a record needs are dropped and reported as
//! [`ParseDiagnostic`]s; exporters in transition routinely produce them, so
//! they never fail a request.

use super::query::{
    Direction, LabelSchema, CLIENT_ID_LABEL, DST_NAMESPACE_LABEL, NAMESPACE_LABEL,
    NO_TLS_REASON_LABEL, SERVER_ID_LABEL,
};
use crate::models::{InboundRecord, OutboundRecord, ResourceRef, Sample};
use std::collections::BTreeMap;

/// A sample that was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct ParseDiagnostic {
    pub direction: Direction,
    pub missing_label: &'static str,
    pub labels: BTreeMap<String, String>,
}

/// Records parsed from one query, tagged with the schema used
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub schema: LabelSchema,
    pub records: Vec<T>,
    pub dropped: Vec<ParseDiagnostic>,
}

impl<T> Parsed<T> {
    fn new(schema: LabelSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
            dropped: Vec::new(),
        }
    }
}

fn required<'a>(sample: &'a Sample, label: &'static str) -> Result<&'a str, &'static str> {
    sample.label(label).ok_or(label)
}

fn optional(sample: &Sample, label: &str) -> String {
    sample.label(label).unwrap_or_default().to_string()
}

fn drop_sample(direction: Direction, missing_label: &'static str, sample: &Sample) -> ParseDiagnostic {
    ParseDiagnostic {
        direction,
        missing_label,
        labels: sample.labels.clone(),
    }
}

fn inbound_record(sample: &Sample, schema: &LabelSchema) -> Result<InboundRecord, &'static str> {
    let name = required(sample, schema.resource_label)?;
    let namespace = required(sample, NAMESPACE_LABEL)?;
    Ok(InboundRecord {
        dst: ResourceRef::new(namespace, schema.resource_type, name),
        client_identity: optional(sample, CLIENT_ID_LABEL),
    })
}

fn outbound_record(sample: &Sample, schema: &LabelSchema) -> Result<OutboundRecord, &'static str> {
    let src_name = required(sample, schema.resource_label)?;
    let src_namespace = required(sample, NAMESPACE_LABEL)?;
    let dst_name = required(sample, schema.dst_resource_label)?;
    let dst_namespace = required(sample, DST_NAMESPACE_LABEL)?;
    Ok(OutboundRecord {
        src: ResourceRef::new(src_namespace, schema.resource_type, src_name),
        dst: ResourceRef::new(dst_namespace, schema.resource_type, dst_name),
        server_identity: optional(sample, SERVER_ID_LABEL),
        no_tls_reason: optional(sample, NO_TLS_REASON_LABEL),
    })
}

/// Parse inbound samples: `(<res>, namespace, client_id)`
pub fn parse_inbound(samples: &[Sample], schema: LabelSchema) -> Parsed<InboundRecord> {
    let mut parsed = Parsed::new(schema);

    for sample in samples {
        let record = inbound_record(sample, &schema);

        match record {
            Ok(record) => parsed.records.push(record),
            Err(missing) => parsed
                .dropped
                .push(drop_sample(Direction::Inbound, missing, sample)),
        }
    }

    parsed
}

/// Parse outbound samples:
/// `(<res>, namespace, dst_<res>, dst_namespace, server_id, no_tls_reason)`
pub fn parse_outbound(samples: &[Sample], schema: LabelSchema) -> Parsed<OutboundRecord> {
    let mut parsed = Parsed::new(schema);

    for sample in samples {
        let record = outbound_record(sample, &schema);

        match record {
            Ok(record) => parsed.records.push(record),
            Err(missing) => parsed
                .dropped
                .push(drop_sample(Direction::Outbound, missing, sample)),
        }
    }

    parsed
}
