//! In-memory [`GraphStore`] for tests and embedding.
//!
//! Holds triples per named graph. It has no SPARQL engine: the
//! existence and label lookups the core needs are answered directly from
//! the stored triples, and [`GraphStore::query`] reports `Unsupported`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{GraphStore, LoadStrategy, QueryResults, DEFAULT_CHUNK_SIZE};
use crate::error::StoreError;
use crate::models::{Literal, Triple};
use crate::vocab::LABEL_PREDICATES;

pub struct MemoryGraphStore {
    graphs: RwLock<BTreeMap<String, Vec<Triple>>>,
    strategy: LoadStrategy,
    load_calls: AtomicUsize,
    /// 1-based load call that is rejected, 0 for none.
    fail_on: AtomicUsize,
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self {
            graphs: RwLock::new(BTreeMap::new()),
            strategy: LoadStrategy::Incremental {
                chunk_size: DEFAULT_CHUNK_SIZE,
            },
            load_calls: AtomicUsize::new(0),
            fail_on: AtomicUsize::new(0),
        }
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Reject the `n`th load call (1-based) once.
    pub fn fail_load_call(&self, n: usize) {
        self.fail_on.store(n, Ordering::SeqCst);
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn triples(&self, graph: &str) -> Vec<Triple> {
        self.graphs
            .read()
            .ok()
            .and_then(|g| g.get(graph).cloned())
            .unwrap_or_default()
    }

    pub fn graph_names(&self) -> Vec<String> {
        self.graphs
            .read()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("graph lock poisoned".into())
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn load_triples(&self, graph: &str, triples: &[Triple]) -> Result<(), StoreError> {
        let call = self.load_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .fail_on
            .compare_exchange(call, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return Err(StoreError::Rejected(format!("load call {} refused", call)));
        }
        let mut graphs = self.graphs.write().map_err(|_| Self::poisoned())?;
        graphs
            .entry(graph.to_string())
            .or_default()
            .extend_from_slice(triples);
        Ok(())
    }

    async fn query(&self, _sparql: &str) -> Result<QueryResults, StoreError> {
        Err(StoreError::Unsupported(
            "the in-memory graph store does not evaluate SPARQL".into(),
        ))
    }

    fn load_strategy(&self) -> LoadStrategy {
        self.strategy
    }

    async fn any_subject_exists(&self, graph: &str, subjects: &[String]) -> Result<bool, StoreError> {
        let graphs = self.graphs.read().map_err(|_| Self::poisoned())?;
        Ok(graphs
            .get(graph)
            .map(|triples| triples.iter().any(|t| subjects.contains(&t.subject)))
            .unwrap_or(false))
    }

    async fn label_literals(
        &self,
        graph: &str,
        subject: &str,
    ) -> Result<Vec<(String, Literal)>, StoreError> {
        let graphs = self.graphs.read().map_err(|_| Self::poisoned())?;
        Ok(graphs
            .get(graph)
            .into_iter()
            .flatten()
            .filter(|t| t.subject == subject && LABEL_PREDICATES.contains(&t.predicate.as_str()))
            .filter_map(|t| Some((t.predicate.clone(), t.object.as_literal()?.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Object;
    use crate::vocab::RDFS_LABEL;
    use futures::executor::block_on;

    #[test]
    fn test_lookups_without_sparql() {
        let store = MemoryGraphStore::new();
        block_on(store.load_triples(
            "http://ex.org/ds/",
            &[
                Triple::new("http://ex.org/a", RDFS_LABEL, Literal::lang("A", "en").into()),
                Triple::new("http://ex.org/a", "http://ex.org/p", Object::iri("http://ex.org/b")),
            ],
        ))
        .unwrap();

        assert!(block_on(store.any_subject_exists("http://ex.org/ds/", &["http://ex.org/a".into()])).unwrap());
        assert!(!block_on(store.any_subject_exists("http://ex.org/other/", &["http://ex.org/a".into()])).unwrap());
        let labels = block_on(store.label_literals("http://ex.org/ds/", "http://ex.org/a")).unwrap();
        assert_eq!(labels, vec![(RDFS_LABEL.to_string(), Literal::lang("A", "en"))]);
        assert!(matches!(
            block_on(store.query("SELECT * WHERE { ?s ?p ?o }")),
            Err(StoreError::Unsupported(_))
        ));
    }
}
