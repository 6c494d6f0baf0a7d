//! Labels of linked resources.
//!
//! When a resource points at another one, the projector denormalizes the
//! target's label into the document. [`LabelLookup`] is the narrow
//! capability it uses for that: batch projection pre-fetches labels of
//! the submitted graph ([`SiblingLabels`]) and falls back to the triple
//! store ([`StoreLabelLookup`]) through [`ChainedLabels`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::models::{Graph, Literal, ResourceDescription};
use crate::store::GraphStore;
use crate::vocab::LABEL_PREDICATES;

/// A resolved label and its language tag, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    pub language: Option<String>,
}

impl From<&Literal> for Label {
    fn from(lit: &Literal) -> Self {
        Self {
            text: lit.value.clone(),
            language: lit.language.clone(),
        }
    }
}

#[async_trait]
pub trait LabelLookup: Send + Sync {
    /// Preferred label of `uri`, or `None` if it has no label predicate.
    async fn label(&self, uri: &str) -> Option<Label>;
}

/// First label-predicate literal of a description, in predicate priority order.
pub fn preferred_label(resource: &ResourceDescription) -> Option<Label> {
    LABEL_PREDICATES.iter().find_map(|p| {
        resource
            .values(p)
            .iter()
            .find_map(|v| v.as_literal())
            .map(Label::from)
    })
}

/// Label synthesized from an IRI: the fragment after `#`, else the last
/// path segment. Trailing separators are ignored.
pub fn uri_tail(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches(['/', '#']);
    let tail = match trimmed.rfind('#') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed.rsplit('/').next().unwrap_or(trimmed),
    };
    if tail.is_empty() {
        uri
    } else {
        tail
    }
}

/// Labels pre-fetched from the graph being indexed.
#[derive(Debug, Clone, Default)]
pub struct SiblingLabels {
    labels: HashMap<String, Label>,
}

impl SiblingLabels {
    pub fn from_graph(graph: &Graph) -> Self {
        let labels = graph
            .resources()
            .iter()
            .filter_map(|r| Some((r.subject.clone(), preferred_label(r)?)))
            .collect();
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[async_trait]
impl LabelLookup for SiblingLabels {
    async fn label(&self, uri: &str) -> Option<Label> {
        self.labels.get(uri).cloned()
    }
}

/// Labels read back from a dataset graph in the triple store.
pub struct StoreLabelLookup {
    store: Arc<dyn GraphStore>,
    graph: String,
}

impl StoreLabelLookup {
    pub fn new(store: Arc<dyn GraphStore>, graph: impl Into<String>) -> Self {
        Self {
            store,
            graph: graph.into(),
        }
    }
}

#[async_trait]
impl LabelLookup for StoreLabelLookup {
    async fn label(&self, uri: &str) -> Option<Label> {
        let found = match self.store.label_literals(&self.graph, uri).await {
            Ok(found) => found,
            Err(e) => {
                debug!(uri = %uri, error = %e, "store label lookup failed");
                return None;
            }
        };
        LABEL_PREDICATES.iter().find_map(|p| {
            found
                .iter()
                .find(|(predicate, _)| predicate == p)
                .map(|(_, lit)| Label::from(lit))
        })
    }
}

/// Tries each lookup in turn; the first label found wins.
#[derive(Default)]
pub struct ChainedLabels {
    lookups: Vec<Arc<dyn LabelLookup>>,
}

impl ChainedLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, lookup: Arc<dyn LabelLookup>) -> Self {
        self.lookups.push(lookup);
        self
    }
}

#[async_trait]
impl LabelLookup for ChainedLabels {
    async fn label(&self, uri: &str) -> Option<Label> {
        for lookup in &self.lookups {
            if let Some(label) = lookup.label(uri).await {
                return Some(label);
            }
        }
        None
    }
}
