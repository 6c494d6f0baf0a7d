//! Core data models used throughout ontodex.
//!
//! These types represent the parsed RDF graph, the per-subject resource
//! descriptions derived from it, and the flat search documents that the
//! projection engine produces from them.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A literal RDF value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl Literal {
    pub fn simple(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn lang(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: Some(language.into()),
            datatype: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
            datatype: Some(datatype.into()),
        }
    }
}

/// The object position of a triple.
///
/// Blank nodes are carried with their `_:` prefix so they can be told
/// apart from IRIs by string inspection alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Object {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Object {
    pub fn iri(value: impl Into<String>) -> Self {
        Object::Iri(value.into())
    }

    /// IRI or blank-node identifier, if this is a reference.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Object::Iri(iri) | Object::Blank(iri) => Some(iri),
            Object::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Object::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// The lexical form used when matching reification statements.
    pub fn lexical(&self) -> &str {
        match self {
            Object::Iri(v) | Object::Blank(v) => v,
            Object::Literal(lit) => &lit.value,
        }
    }
}

impl From<Literal> for Object {
    fn from(lit: Literal) -> Self {
        Object::Literal(lit)
    }
}

/// A single parsed statement. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Object) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }

    /// Render this triple as one N-Triples line (without the newline).
    pub fn to_ntriples(&self) -> String {
        let subject: oxrdf::Subject = match blank_id(&self.subject) {
            Some(id) => oxrdf::BlankNode::new_unchecked(id).into(),
            None => oxrdf::NamedNode::new_unchecked(self.subject.as_str()).into(),
        };
        let predicate = oxrdf::NamedNode::new_unchecked(self.predicate.as_str());
        let object: oxrdf::Term = match &self.object {
            Object::Iri(iri) => oxrdf::NamedNode::new_unchecked(iri.as_str()).into(),
            Object::Blank(id) => {
                oxrdf::BlankNode::new_unchecked(blank_id(id).unwrap_or(id.as_str())).into()
            }
            Object::Literal(lit) => match (&lit.language, &lit.datatype) {
                (Some(lang), _) => {
                    oxrdf::Literal::new_language_tagged_literal_unchecked(&lit.value, lang).into()
                }
                (None, Some(dt)) => oxrdf::Literal::new_typed_literal(
                    &lit.value,
                    oxrdf::NamedNode::new_unchecked(dt.as_str()),
                )
                .into(),
                (None, None) => oxrdf::Literal::new_simple_literal(&lit.value).into(),
            },
        };
        format!("{} .", oxrdf::Triple::new(subject, predicate, object))
    }
}

/// Strip the `_:` prefix from a blank-node identifier.
pub fn blank_id(value: &str) -> Option<&str> {
    value.strip_prefix("_:")
}

/// Whether a subject identifier denotes a blank node.
pub fn is_blank_node(uri: &str) -> bool {
    uri.starts_with("_:")
}

/// All statements about one subject, grouped by predicate.
///
/// Predicates and their values keep document order so that
/// "first value wins" rules are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDescription {
    pub subject: String,
    pub predicates: Vec<(String, Vec<Object>)>,
}

impl ResourceDescription {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicates: Vec::new(),
        }
    }

    pub fn push(&mut self, predicate: &str, object: Object) {
        match self.predicates.iter_mut().find(|(p, _)| p == predicate) {
            Some((_, values)) => values.push(object),
            None => self.predicates.push((predicate.to_string(), vec![object])),
        }
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, predicate: &str, object: Object) -> Self {
        self.push(predicate, object);
        self
    }

    pub fn values(&self, predicate: &str) -> &[Object] {
        self.predicates
            .iter()
            .find(|(p, _)| p == predicate)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// IRIs asserted through `rdf:type`, in document order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.values(crate::vocab::RDF_TYPE)
            .iter()
            .filter_map(Object::as_reference)
    }

    pub fn has_type(&self, class: &str) -> bool {
        self.types().any(|t| t == class)
    }

    pub fn triples(&self) -> impl Iterator<Item = Triple> + '_ {
        self.predicates.iter().flat_map(move |(p, values)| {
            values
                .iter()
                .map(move |o| Triple::new(self.subject.clone(), p.clone(), o.clone()))
        })
    }

    pub fn triple_count(&self) -> usize {
        self.predicates.iter().map(|(_, v)| v.len()).sum()
    }
}

/// A parsed RDF document: one [`ResourceDescription`] per subject.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    resources: Vec<ResourceDescription>,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let mut graph = Self::new();
        for triple in triples {
            graph.insert(triple);
        }
        graph
    }

    pub fn insert(&mut self, triple: Triple) {
        let idx = match self.index.get(&triple.subject) {
            Some(idx) => *idx,
            None => {
                self.resources
                    .push(ResourceDescription::new(triple.subject.clone()));
                let idx = self.resources.len() - 1;
                self.index.insert(triple.subject.clone(), idx);
                idx
            }
        };
        self.resources[idx].push(&triple.predicate, triple.object);
    }

    /// Add a whole description, merging with any existing one for the subject.
    pub fn add(&mut self, description: ResourceDescription) {
        for triple in description.triples() {
            self.insert(triple);
        }
    }

    pub fn get(&self, subject: &str) -> Option<&ResourceDescription> {
        self.index.get(subject).map(|idx| &self.resources[*idx])
    }

    /// Descriptions in document order (order of first appearance).
    pub fn resources(&self) -> &[ResourceDescription] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn triple_count(&self) -> usize {
        self.resources.iter().map(|r| r.triple_count()).sum()
    }
}

/// Role assigned to each subject of a submitted graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRole {
    DatasetDescription,
    ReificationStatement,
    Instance,
}

/// Ontology facts about a predicate.
///
/// The [`Default`] value carries no cardinality and no range, which the
/// projector treats as plain multi-valued string handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub cardinality: Option<u32>,
    pub max_cardinality: Option<u32>,
    #[serde(default)]
    pub range: BTreeSet<String>,
}

impl PropertyMetadata {
    pub fn is_single_valued(&self) -> bool {
        self.cardinality == Some(1) || self.max_cardinality == Some(1)
    }

    pub fn has_range(&self, datatype: &str) -> bool {
        self.range.contains(datatype)
    }
}

/// Super-class closure of a class: the class first, the root type last.
pub type ClassClosure = Vec<String>;

/// One typed value of a search document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexField {
    pub name: String,
    pub value: String,
    pub multi_valued: bool,
}

/// A flat, schema-flexible search document for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDocument {
    pub uid: String,
    pub uri: String,
    pub dataset: String,
    pub fields: Vec<IndexField>,
}

impl IndexDocument {
    pub fn new(dataset: &str, uri: &str) -> Self {
        Self {
            uid: document_uid(dataset, uri),
            uri: uri.to_string(),
            dataset: dataset.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>, multi_valued: bool) {
        self.fields.push(IndexField {
            name: name.into(),
            value: value.into(),
            multi_valued,
        });
    }

    /// All values of a field, in insertion order.
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .map(|f| f.value.as_str())
            .collect()
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.fields.iter().any(|f| f.name == name && f.value == value)
    }

    /// Distinct field names, in first-appearance order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.fields
            .iter()
            .filter(|f| seen.insert(f.name.as_str()))
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Deterministic document id: SHA-256 over dataset and subject, NUL-separated.
pub fn document_uid(dataset: &str, subject: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dataset.as_bytes());
    hasher.update(b"\0");
    hasher.update(subject.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::RDF_TYPE;

    #[test]
    fn test_graph_groups_by_subject_in_document_order() {
        let graph = Graph::from_triples(vec![
            Triple::new("http://ex.org/b", RDF_TYPE, Object::iri("http://ex.org/T")),
            Triple::new("http://ex.org/a", RDF_TYPE, Object::iri("http://ex.org/T")),
            Triple::new("http://ex.org/b", "http://ex.org/p", Literal::simple("1").into()),
            Triple::new("http://ex.org/b", "http://ex.org/p", Literal::simple("2").into()),
        ]);
        let subjects: Vec<&str> = graph.resources().iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["http://ex.org/b", "http://ex.org/a"]);
        let b = graph.get("http://ex.org/b").unwrap();
        assert_eq!(b.values("http://ex.org/p").len(), 2);
        assert_eq!(graph.triple_count(), 4);
    }

    #[test]
    fn test_document_uid_is_deterministic() {
        let a = document_uid("http://ex.org/ds/", "http://ex.org/x");
        let b = document_uid("http://ex.org/ds/", "http://ex.org/x");
        let c = document_uid("http://ex.org/other/", "http://ex.org/x");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_document_uid_keeps_dataset_and_subject_apart() {
        assert_ne!(
            document_uid("http://a/x", "yz"),
            document_uid("http://a/", "xyz")
        );
    }

    #[test]
    fn test_ntriples_rendering() {
        let t = Triple::new(
            "http://ex.org/s",
            "http://ex.org/p",
            Literal::lang("hello", "en").into(),
        );
        assert_eq!(
            t.to_ntriples(),
            "<http://ex.org/s> <http://ex.org/p> \"hello\"@en ."
        );
        let b = Triple::new("_:b0", "http://ex.org/p", Object::iri("http://ex.org/o"));
        assert_eq!(b.to_ntriples(), "_:b0 <http://ex.org/p> <http://ex.org/o> .");
    }

    #[test]
    fn test_single_valued_metadata() {
        let mut m = PropertyMetadata::default();
        assert!(!m.is_single_valued());
        m.max_cardinality = Some(1);
        assert!(m.is_single_valued());
        m.max_cardinality = None;
        m.cardinality = Some(1);
        assert!(m.is_single_valued());
    }
}
