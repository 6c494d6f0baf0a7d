//! Triple-store abstraction and the chunked graph loader.
//!
//! The [`GraphStore`] trait is the narrow surface the indexing core needs
//! from a triple store: graph-scoped loads and simple SELECT/ASK queries.
//! [`GraphLoadCoordinator`] writes classified resources through it in
//! fixed-size chunks and stops at the first chunk the store refuses.

pub mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{StoreError, StoreWriteError};
use crate::models::{is_blank_node, Literal, Object, ResourceDescription, Triple};
use crate::vocab::LABEL_PREDICATES;

pub use memory::MemoryGraphStore;

/// Resources per chunk for incremental inserts.
pub const DEFAULT_CHUNK_SIZE: usize = 25;

/// How a backend wants to receive triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Native bulk RDF load: a whole graph in one request.
    Bulk,
    /// Query-string inserts, bounded to `chunk_size` resources each.
    Incremental { chunk_size: usize },
}

/// One row of a SELECT result.
pub type Bindings = BTreeMap<String, Object>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResults {
    Boolean(bool),
    Solutions(Vec<Bindings>),
}

/// A triple store the indexer writes instance data into.
///
/// Backends serialize triples into whatever wire syntax they speak. The
/// provided methods build SPARQL and run it through [`query`](Self::query);
/// backends without a query engine override them.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Append `triples` to the named graph.
    async fn load_triples(&self, graph: &str, triples: &[Triple]) -> Result<(), StoreError>;

    async fn query(&self, sparql: &str) -> Result<QueryResults, StoreError>;

    fn load_strategy(&self) -> LoadStrategy;

    /// Whether any of `subjects` already has statements in `graph`.
    async fn any_subject_exists(&self, graph: &str, subjects: &[String]) -> Result<bool, StoreError> {
        let Some(sparql) = subjects_exist_query(graph, subjects) else {
            return Ok(false);
        };
        match self.query(&sparql).await? {
            QueryResults::Boolean(b) => Ok(b),
            QueryResults::Solutions(_) => Err(StoreError::Malformed("expected ASK result".into())),
        }
    }

    /// Label-predicate literals of `subject` in `graph`, as (predicate, literal) pairs.
    async fn label_literals(
        &self,
        graph: &str,
        subject: &str,
    ) -> Result<Vec<(String, Literal)>, StoreError> {
        let Some(sparql) = label_query(graph, subject) else {
            return Ok(Vec::new());
        };
        let rows = match self.query(&sparql).await? {
            QueryResults::Solutions(rows) => rows,
            QueryResults::Boolean(_) => {
                return Err(StoreError::Malformed("expected SELECT result".into()))
            }
        };
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let p = row.get("p")?.as_reference()?.to_string();
                let label = row.get("label")?.as_literal()?.clone();
                Some((p, label))
            })
            .collect())
    }
}

/// Whether `iri` can be written between `<` and `>` in SPARQL as-is.
pub fn is_safe_iri(iri: &str) -> bool {
    !iri.is_empty()
        && !iri
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "<>\"{}|^`\\".contains(c))
}

/// ASK whether any of `subjects` appears as a subject in `graph`.
///
/// Blank nodes and IRIs that cannot be embedded are left out; `None`
/// when nothing is left to ask about.
pub fn subjects_exist_query(graph: &str, subjects: &[String]) -> Option<String> {
    if !is_safe_iri(graph) {
        return None;
    }
    let values: Vec<String> = subjects
        .iter()
        .filter(|s| !is_blank_node(s) && is_safe_iri(s))
        .map(|s| format!("<{}>", s))
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(format!(
        "ASK {{ GRAPH <{}> {{ VALUES ?s {{ {} }} ?s ?p ?o }} }}",
        graph,
        values.join(" ")
    ))
}

/// SELECT the label-predicate values of one subject.
pub fn label_query(graph: &str, subject: &str) -> Option<String> {
    if is_blank_node(subject) || !is_safe_iri(subject) || !is_safe_iri(graph) {
        return None;
    }
    let predicates: Vec<String> = LABEL_PREDICATES.iter().map(|p| format!("<{}>", p)).collect();
    Some(format!(
        "SELECT ?p ?label WHERE {{ GRAPH <{}> {{ VALUES ?p {{ {} }} <{}> ?p ?label }} }}",
        graph,
        predicates.join(" "),
        subject
    ))
}

/// Graph holding a dataset's reification statements.
pub fn reification_graph(dataset: &str) -> String {
    format!("{}reification/", dataset)
}

/// Outcome of one successful [`GraphLoadCoordinator`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub graph: String,
    pub resources: usize,
    pub triples: usize,
    pub chunks: usize,
}

/// Writes classified resources into the triple store chunk by chunk.
///
/// A failed chunk ends the call: later chunks are not attempted and
/// earlier ones stay written. The returned [`StoreWriteError`] names the
/// chunk so a caller can resume with [`load_from`](Self::load_from).
pub struct GraphLoadCoordinator {
    store: Arc<dyn GraphStore>,
}

impl GraphLoadCoordinator {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Dataset description plus instance records, into the dataset graph.
    pub async fn load_instances<'a>(
        &self,
        dataset: &str,
        instances: impl IntoIterator<Item = &'a ResourceDescription>,
    ) -> Result<LoadReport, StoreWriteError> {
        let resources: Vec<&ResourceDescription> = instances.into_iter().collect();
        self.load_from(dataset, dataset, &resources, 0).await
    }

    /// Reification statements, into the dataset's reification graph.
    pub async fn load_statements<'a>(
        &self,
        dataset: &str,
        statements: impl IntoIterator<Item = &'a ResourceDescription>,
    ) -> Result<LoadReport, StoreWriteError> {
        let resources: Vec<&ResourceDescription> = statements.into_iter().collect();
        self.load_from(dataset, &reification_graph(dataset), &resources, 0)
            .await
    }

    /// Load `resources` into `graph`, skipping chunks before `start_chunk`.
    pub async fn load_from(
        &self,
        dataset: &str,
        graph: &str,
        resources: &[&ResourceDescription],
        start_chunk: usize,
    ) -> Result<LoadReport, StoreWriteError> {
        let chunk_size = match self.store.load_strategy() {
            LoadStrategy::Bulk => resources.len().max(1),
            LoadStrategy::Incremental { chunk_size } => chunk_size.max(1),
        };
        let chunks: Vec<&[&ResourceDescription]> = resources.chunks(chunk_size).collect();
        let chunk_count = chunks.len();
        let mut report = LoadReport {
            graph: graph.to_string(),
            ..Default::default()
        };

        for (chunk_index, chunk) in chunks.into_iter().enumerate().skip(start_chunk) {
            let triples: Vec<Triple> = chunk.iter().flat_map(|r| r.triples()).collect();
            self.store
                .load_triples(graph, &triples)
                .await
                .map_err(|source| StoreWriteError {
                    dataset: dataset.to_string(),
                    graph: graph.to_string(),
                    chunk_index,
                    chunk_count,
                    source,
                })?;
            debug!(graph = %graph, chunk = chunk_index, of = chunk_count, triples = triples.len(), "loaded chunk");
            report.resources += chunk.len();
            report.triples += triples.len();
            report.chunks += 1;
        }

        if report.chunks > 0 {
            info!(
                graph = %graph,
                resources = report.resources,
                triples = report.triples,
                chunks = report.chunks,
                "graph load complete"
            );
        }
        Ok(report)
    }
}
