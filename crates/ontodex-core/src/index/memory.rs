//! In-memory [`DocumentIndex`].
//!
//! Writes are buffered until [`commit`](DocumentIndex::commit) unless the
//! index runs in autocommit mode. Failure switches make the coordinator's
//! error paths testable.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::DocumentIndex;
use crate::error::IndexError;
use crate::models::IndexDocument;

#[derive(Default)]
pub struct MemoryDocumentIndex {
    committed: RwLock<BTreeMap<String, IndexDocument>>,
    pending: RwLock<BTreeMap<String, IndexDocument>>,
    schema: RwLock<BTreeSet<String>>,
    rejected: RwLock<HashSet<String>>,
    autocommit: bool,
    fail_commit: AtomicBool,
    fail_schema_refresh: AtomicBool,
    commits: AtomicUsize,
    schema_refreshes: AtomicUsize,
}

fn poisoned() -> IndexError {
    IndexError::Unavailable("index lock poisoned".into())
}

impl MemoryDocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_autocommit(mut self) -> Self {
        self.autocommit = true;
        self
    }

    /// Reject every document with this URI.
    pub fn reject(&self, uri: &str) {
        if let Ok(mut rejected) = self.rejected.write() {
            rejected.insert(uri.to_string());
        }
    }

    pub fn fail_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_schema_refresh(&self) {
        self.fail_schema_refresh.store(true, Ordering::SeqCst);
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn schema_refreshes(&self) -> usize {
        self.schema_refreshes.load(Ordering::SeqCst)
    }

    /// Number of committed documents.
    pub fn len(&self) -> usize {
        self.committed.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, uid: &str) -> Option<IndexDocument> {
        self.committed.read().ok()?.get(uid).cloned()
    }

    pub fn find_by_uri(&self, uri: &str) -> Option<IndexDocument> {
        self.committed
            .read()
            .ok()?
            .values()
            .find(|d| d.uri == uri)
            .cloned()
    }

    pub fn documents(&self) -> Vec<IndexDocument> {
        self.committed
            .read()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn known_fields(&self) -> BTreeSet<String> {
        self.schema.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentIndex for MemoryDocumentIndex {
    async fn add_document(&self, document: &IndexDocument) -> Result<(), IndexError> {
        let rejected = self
            .rejected
            .read()
            .map(|r| r.contains(&document.uri))
            .unwrap_or(false);
        if rejected {
            return Err(IndexError::Rejected(format!("document <{}> refused", document.uri)));
        }
        let target = if self.autocommit {
            &self.committed
        } else {
            &self.pending
        };
        target
            .write()
            .map_err(|_| poisoned())?
            .insert(document.uid.clone(), document.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<(), IndexError> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("commit refused".into()));
        }
        let drained = std::mem::take(&mut *self.pending.write().map_err(|_| poisoned())?);
        self.committed
            .write()
            .map_err(|_| poisoned())?
            .extend(drained);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_known_fields(&self) -> Result<BTreeSet<String>, IndexError> {
        Ok(self.schema.read().map_err(|_| poisoned())?.clone())
    }

    async fn refresh_field_schema(&self) -> Result<(), IndexError> {
        if self.fail_schema_refresh.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("schema refresh refused".into()));
        }
        let mut names: BTreeSet<String> = BTreeSet::new();
        for store in [&self.committed, &self.pending] {
            let docs = store.read().map_err(|_| poisoned())?;
            for doc in docs.values() {
                names.extend(doc.fields.iter().map(|f| f.name.clone()));
            }
        }
        self.schema.write().map_err(|_| poisoned())?.extend(names);
        self.schema_refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_buffered_until_commit() {
        let index = MemoryDocumentIndex::new();
        let doc = IndexDocument::new("http://ex.org/ds/", "http://ex.org/a");
        block_on(index.add_document(&doc)).unwrap();
        assert!(index.is_empty());
        block_on(index.commit()).unwrap();
        assert_eq!(index.get(&doc.uid).map(|d| d.uri), Some("http://ex.org/a".to_string()));
        assert!(index.find_by_uri("http://ex.org/a").is_some());
    }

    #[test]
    fn test_reindex_replaces_by_uid() {
        let index = MemoryDocumentIndex::new().with_autocommit();
        let mut doc = IndexDocument::new("http://ex.org/ds/", "http://ex.org/a");
        block_on(index.add_document(&doc)).unwrap();
        doc.push("type", "http://ex.org/T", true);
        block_on(index.add_document(&doc)).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.documents()[0].fields.len(), 1);
    }
}
