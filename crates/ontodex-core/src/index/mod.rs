//! Document-index abstraction and the batch writer.
//!
//! [`DocumentIndex`] is the surface a search backend exposes to the
//! indexer. [`IndexWriteCoordinator`] pushes a batch of projected
//! documents through it: per-document failures are collected rather than
//! aborting the batch, then the batch is committed and the field schema is
//! refreshed if new fields appeared. Telling downstream caches to drop what
//! the write made stale is left to the caller, which also knows whether the
//! triple store changed.

pub mod memory;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cache::{CacheInvalidator, CacheRegion};
use crate::error::{IndexError, IndexWriteError, IndexingError};
use crate::models::IndexDocument;
use crate::schema::DynamicSchemaGuard;

pub use memory::MemoryDocumentIndex;

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Add or replace the document with the same `uid`.
    async fn add_document(&self, document: &IndexDocument) -> Result<(), IndexError>;

    async fn commit(&self) -> Result<(), IndexError>;

    /// Field names the index schema currently knows.
    async fn list_known_fields(&self) -> Result<BTreeSet<String>, IndexError>;

    /// Bring the index's field schema up to date with what was written.
    async fn refresh_field_schema(&self) -> Result<(), IndexError>;
}

/// Outcome of a successful [`IndexWriteCoordinator::index_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBatchReport {
    pub indexed: usize,
    pub new_fields: Vec<String>,
    pub committed: bool,
}

pub struct IndexWriteCoordinator {
    index: Arc<dyn DocumentIndex>,
    invalidator: Arc<dyn CacheInvalidator>,
    autocommit: bool,
}

impl IndexWriteCoordinator {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        invalidator: Arc<dyn CacheInvalidator>,
        autocommit: bool,
    ) -> Self {
        Self {
            index,
            invalidator,
            autocommit,
        }
    }

    /// Write `documents`, commit, refresh the schema.
    ///
    /// Rejected documents do not stop the batch. Once the accepted ones
    /// are committed and the schema is refreshed, the rejections are
    /// returned as [`IndexWriteError::Documents`]. Caches are not touched;
    /// see [`IndexWriteCoordinator::invalidate_after_write`].
    pub async fn index_batch(
        &self,
        documents: &[IndexDocument],
    ) -> Result<IndexBatchReport, IndexingError> {
        if documents.is_empty() {
            return Ok(IndexBatchReport::default());
        }

        let known = self
            .index
            .list_known_fields()
            .await
            .map_err(IndexingError::SchemaUpdate)?;
        let mut guard = DynamicSchemaGuard::begin_batch(known);

        let mut failures: Vec<(String, String)> = Vec::new();
        for document in documents {
            match self.index.add_document(document).await {
                Ok(()) => {
                    let new = guard.observe(document);
                    debug!(uri = %document.uri, fields = document.fields.len(), new_fields = new, "document added");
                }
                Err(e) => {
                    warn!(uri = %document.uri, error = %e, "document rejected by index");
                    failures.push((document.uri.clone(), e.to_string()));
                }
            }
        }

        let mut report = IndexBatchReport {
            indexed: documents.len() - failures.len(),
            ..Default::default()
        };
        if report.indexed > 0 {
            if !self.autocommit {
                self.index
                    .commit()
                    .await
                    .map_err(|e| IndexingError::IndexWrite(IndexWriteError::Commit(e)))?;
                report.committed = true;
            }
            if guard.needs_refresh() {
                self.index
                    .refresh_field_schema()
                    .await
                    .map_err(IndexingError::SchemaUpdate)?;
                report.new_fields = guard.new_fields().to_vec();
            }
        }

        info!(
            indexed = report.indexed,
            rejected = failures.len(),
            new_fields = report.new_fields.len(),
            "index batch complete"
        );
        if failures.is_empty() {
            Ok(report)
        } else {
            Err(IndexWriteError::Documents {
                attempted: documents.len(),
                failures,
            }
            .into())
        }
    }

    /// Drop every cache region a write to the store or index makes stale.
    pub async fn invalidate_after_write(&self) {
        for region in CacheRegion::AFTER_WRITE {
            self.invalidator.invalidate(region).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RecordingInvalidator;
    use futures::executor::block_on;

    fn doc(uri: &str, extra: &str) -> IndexDocument {
        let mut d = IndexDocument::new("http://ex.org/ds/", uri);
        d.push("uri", uri, false);
        d.push(extra, "x", true);
        d
    }

    fn coordinator(
        index: Arc<MemoryDocumentIndex>,
        autocommit: bool,
    ) -> (IndexWriteCoordinator, Arc<RecordingInvalidator>) {
        let invalidator = Arc::new(RecordingInvalidator::new());
        (
            IndexWriteCoordinator::new(index, invalidator.clone(), autocommit),
            invalidator,
        )
    }

    #[test]
    fn test_batch_commits_and_refreshes_schema() {
        let index = Arc::new(MemoryDocumentIndex::new());
        let (writer, invalidator) = coordinator(index.clone(), false);
        let report = block_on(writer.index_batch(&[doc("http://ex.org/a", "f1"), doc("http://ex.org/b", "f1")]))
            .unwrap();
        assert_eq!(report.indexed, 2);
        assert!(report.committed);
        assert_eq!(report.new_fields, vec!["uri".to_string(), "f1".to_string()]);
        assert_eq!(index.commits(), 1);
        assert_eq!(index.schema_refreshes(), 1);
        assert_eq!(index.len(), 2);
        assert!(invalidator.seen().is_empty());

        // Known fields now: no refresh on the next batch.
        let report = block_on(writer.index_batch(&[doc("http://ex.org/c", "f1")])).unwrap();
        assert!(report.new_fields.is_empty());
        assert_eq!(index.schema_refreshes(), 1);
    }

    #[test]
    fn test_autocommit_skips_explicit_commit() {
        let index = Arc::new(MemoryDocumentIndex::new().with_autocommit());
        let (writer, _) = coordinator(index.clone(), true);
        let report = block_on(writer.index_batch(&[doc("http://ex.org/a", "f1")])).unwrap();
        assert!(!report.committed);
        assert_eq!(index.commits(), 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_partial_failure_is_surfaced() {
        let index = Arc::new(MemoryDocumentIndex::new());
        index.reject("http://ex.org/bad");
        let (writer, invalidator) = coordinator(index.clone(), false);
        let err = block_on(writer.index_batch(&[
            doc("http://ex.org/a", "f1"),
            doc("http://ex.org/bad", "f2"),
            doc("http://ex.org/c", "f1"),
        ]))
        .unwrap_err();
        match err {
            IndexingError::IndexWrite(IndexWriteError::Documents { attempted, failures }) => {
                assert_eq!(attempted, 3);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "http://ex.org/bad");
            }
            other => panic!("unexpected error: {other}"),
        }
        // The accepted documents are still committed and visible.
        assert_eq!(index.len(), 2);
        assert!(!index.known_fields().contains("f2"));
        assert!(invalidator.seen().is_empty());
    }

    #[test]
    fn test_invalidate_after_write_covers_write_regions() {
        let index = Arc::new(MemoryDocumentIndex::new());
        let (writer, invalidator) = coordinator(index, false);
        let report = block_on(writer.index_batch(&[])).unwrap();
        assert_eq!(report, IndexBatchReport::default());
        assert!(invalidator.seen().is_empty());

        block_on(writer.invalidate_after_write());
        assert_eq!(invalidator.seen(), CacheRegion::AFTER_WRITE.to_vec());
    }

    #[test]
    fn test_schema_refresh_failure_is_fatal() {
        let index = Arc::new(MemoryDocumentIndex::new());
        index.fail_schema_refresh();
        let (writer, invalidator) = coordinator(index, false);
        let err = block_on(writer.index_batch(&[doc("http://ex.org/a", "f1")])).unwrap_err();
        assert!(matches!(err, IndexingError::SchemaUpdate(_)));
        assert!(invalidator.seen().is_empty());
    }

    #[test]
    fn test_commit_failure_is_fatal() {
        let index = Arc::new(MemoryDocumentIndex::new());
        index.fail_commit();
        let (writer, invalidator) = coordinator(index, false);
        let err = block_on(writer.index_batch(&[doc("http://ex.org/a", "f1")])).unwrap_err();
        assert!(matches!(
            err,
            IndexingError::IndexWrite(IndexWriteError::Commit(_))
        ));
        assert!(invalidator.seen().is_empty());
    }
}
