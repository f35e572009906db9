//! Error types for the edges API.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a metrics backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to metrics backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metrics backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("metrics backend rejected query ({error_type}): {error}")]
    Api { error_type: String, error: String },

    #[error("unexpected result type \"{0}\", expected vector")]
    UnexpectedResultType(String),

    #[error("malformed sample: {0}")]
    MalformedSample(String),

    #[error("invalid metrics backend URL: {0}")]
    InvalidUrl(String),
}

/// Error returned by an `Edges` request
#[derive(Error, Debug)]
pub enum EdgesError {
    #[error("invalid selector: {reason}")]
    InvalidSelector { reason: String },

    #[error("invalid page token")]
    InvalidPageToken,

    #[error("{direction} query failed: {source}")]
    Backend {
        direction: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("metrics queries did not complete within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("label schema mismatch: inbound records are for {inbound}, outbound records for {outbound}")]
    SchemaMismatch { inbound: String, outbound: String },
}

impl EdgesError {
    /// Short label for the requests counter
    pub fn kind(&self) -> &'static str {
        match self {
            EdgesError::InvalidSelector { .. } | EdgesError::InvalidPageToken => "invalid_request",
            EdgesError::Backend { .. } => "backend_error",
            EdgesError::DeadlineExceeded(_) => "deadline_exceeded",
            EdgesError::SchemaMismatch { .. } => "internal",
        }
    }
}

impl From<EdgesError> for tonic::Status {
    fn from(err: EdgesError) -> Self {
        let message = err.to_string();
        match err {
            EdgesError::InvalidSelector { .. } | EdgesError::InvalidPageToken => {
                tonic::Status::invalid_argument(message)
            }
            EdgesError::Backend { .. } => tonic::Status::unavailable(message),
            EdgesError::DeadlineExceeded(_) => tonic::Status::deadline_exceeded(message),
            EdgesError::SchemaMismatch { .. } => tonic::Status::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let status: tonic::Status = EdgesError::InvalidPageToken.into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = EdgesError::Backend {
            direction: "inbound",
            source: BackendError::Status {
                status: 503,
                body: "unavailable".to_string(),
            },
        }
        .into();
        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert!(status.message().contains("inbound query failed"));

        let status: tonic::Status = EdgesError::DeadlineExceeded(Duration::from_secs(1)).into();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }
}
