//! Error taxonomy for the indexing core.
//!
//! Only hard failures are errors. Soft degradations (missing ontology
//! metadata, unresolvable classes, values that fail typed validation)
//! are reported as [`Diagnostic`](crate::project::Diagnostic)s instead.

use thiserror::Error;

/// Failure reported by a [`GraphStore`](crate::store::GraphStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("graph store rejected request: {0}")]
    Rejected(String),
    #[error("graph store unreachable: {0}")]
    Unavailable(String),
    #[error("unsupported graph store operation: {0}")]
    Unsupported(String),
    #[error("malformed graph store response: {0}")]
    Malformed(String),
}

/// Failure reported by a [`DocumentIndex`](crate::index::DocumentIndex) backend.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("document index rejected request: {0}")]
    Rejected(String),
    #[error("document index unreachable: {0}")]
    Unavailable(String),
}

/// Failure looking something up in the ontology service.
///
/// Always soft: resolvers turn every variant into a degraded result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OntologyError {
    #[error("ontology service denied access to {0}")]
    PermissionDenied(String),
    #[error("ontology lookup timed out")]
    Timeout,
    #[error("ontology service unreachable: {0}")]
    Unavailable(String),
    #[error("malformed ontology response: {0}")]
    Malformed(String),
}

/// A graph chunk that the triple store refused.
#[derive(Debug, Error)]
#[error("failed to load chunk {chunk_index} of {chunk_count} into <{graph}> (dataset <{dataset}>): {source}")]
pub struct StoreWriteError {
    pub dataset: String,
    pub graph: String,
    pub chunk_index: usize,
    pub chunk_count: usize,
    #[source]
    pub source: StoreError,
}

/// Documents or the commit that the document index refused.
#[derive(Debug, Error)]
pub enum IndexWriteError {
    #[error("{} of {attempted} documents rejected{}", .failures.len(), first_failure(.failures))]
    Documents {
        attempted: usize,
        failures: Vec<(String, String)>,
    },
    #[error("commit failed: {0}")]
    Commit(#[source] IndexError),
}

fn first_failure(failures: &[(String, String)]) -> String {
    failures
        .first()
        .map(|(uri, msg)| format!(" (first: <{}>: {})", uri, msg))
        .unwrap_or_default()
}

/// Submission-level failure.
#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("failed to parse RDF document: {0}")]
    Parse(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    StoreWrite(#[from] StoreWriteError),
    #[error("pre-flight query failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    IndexWrite(#[from] IndexWriteError),
    #[error("failed to refresh field schema: {0}")]
    SchemaUpdate(#[source] IndexError),
    #[error("indexing cancelled before {0}")]
    Cancelled(&'static str),
}

impl IndexingError {
    /// Whether the failure is attributable to the submitted content
    /// rather than to the platform.
    pub fn is_client_error(&self) -> bool {
        matches!(self, IndexingError::Parse(_) | IndexingError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_mapping() {
        assert!(IndexingError::Parse("line 1".into()).is_client_error());
        assert!(IndexingError::Conflict("exists".into()).is_client_error());
        assert!(!IndexingError::SchemaUpdate(IndexError::Rejected("x".into())).is_client_error());
        let write = StoreWriteError {
            dataset: "http://ex.org/ds/".into(),
            graph: "http://ex.org/ds/".into(),
            chunk_index: 2,
            chunk_count: 4,
            source: StoreError::Rejected("syntax".into()),
        };
        let msg = write.to_string();
        assert!(msg.contains("chunk 2 of 4"));
        assert!(!IndexingError::from(write).is_client_error());
    }

    #[test]
    fn test_document_failures_message() {
        let err = IndexWriteError::Documents {
            attempted: 3,
            failures: vec![("http://ex.org/a".into(), "bad field".into())],
        };
        assert_eq!(
            err.to_string(),
            "1 of 3 documents rejected (first: <http://ex.org/a>: bad field)"
        );
    }
}
