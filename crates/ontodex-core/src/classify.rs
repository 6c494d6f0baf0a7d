//! Partition a parsed graph into dataset description, reification
//! statements, and instance records.
//!
//! Classification is a pure pass over `rdf:type` assertions. A subject
//! typed `void:Dataset` is the dataset description (the first one in
//! document order wins), a subject typed `rdf:Statement` is a reification
//! statement, and everything else is an instance.

use std::collections::HashMap;

use tracing::warn;

use crate::models::{Graph, Object, ResourceDescription, ResourceRole};
use crate::vocab::{RDF_OBJECT, RDF_PREDICATE, RDF_STATEMENT, RDF_SUBJECT, VOID_DATASET};

/// Result of [`classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub dataset: Option<String>,
    pub statements: Vec<String>,
    pub instances: Vec<String>,
    /// Further `void:Dataset` subjects after the first. Neither loaded nor indexed.
    pub ignored_datasets: Vec<String>,
}

impl Classification {
    pub fn role(&self, subject: &str) -> Option<ResourceRole> {
        if self.dataset.as_deref() == Some(subject) {
            Some(ResourceRole::DatasetDescription)
        } else if self.statements.iter().any(|s| s == subject) {
            Some(ResourceRole::ReificationStatement)
        } else if self.instances.iter().any(|s| s == subject) {
            Some(ResourceRole::Instance)
        } else {
            None
        }
    }
}

pub fn classify(graph: &Graph) -> Classification {
    let mut out = Classification::default();
    for resource in graph.resources() {
        let subject = resource.subject.clone();
        if resource.has_type(VOID_DATASET) {
            if out.dataset.is_none() {
                out.dataset = Some(subject);
            } else {
                warn!(subject = %subject, "ignoring additional void:Dataset description");
                out.ignored_datasets.push(subject);
            }
        } else if resource.has_type(RDF_STATEMENT) {
            out.statements.push(subject);
        } else {
            out.instances.push(subject);
        }
    }
    out
}

/// Key identifying a reified triple: (subject, predicate, object term).
type ReifiedKey = (String, String, Object);

/// A classified graph plus the lookup structures projection needs.
///
/// Read-only once built; shared across concurrent projections.
#[derive(Debug)]
pub struct ClassifiedGraph {
    graph: Graph,
    classification: Classification,
    reifications: HashMap<ReifiedKey, Vec<usize>>,
}

impl ClassifiedGraph {
    pub fn new(graph: Graph) -> Self {
        let classification = classify(&graph);
        let mut reifications: HashMap<ReifiedKey, Vec<usize>> = HashMap::new();
        for (idx, resource) in graph.resources().iter().enumerate() {
            if !resource.has_type(RDF_STATEMENT) {
                continue;
            }
            if let Some(key) = reified_key(resource) {
                reifications.entry(key).or_default().push(idx);
            }
        }
        Self {
            graph,
            classification,
            reifications,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn dataset_description(&self) -> Option<&ResourceDescription> {
        self.classification
            .dataset
            .as_deref()
            .and_then(|s| self.graph.get(s))
    }

    pub fn instances(&self) -> impl Iterator<Item = &ResourceDescription> {
        self.classification
            .instances
            .iter()
            .filter_map(|s| self.graph.get(s))
    }

    pub fn statements(&self) -> impl Iterator<Item = &ResourceDescription> {
        self.classification
            .statements
            .iter()
            .filter_map(|s| self.graph.get(s))
    }

    /// Reification statements about exactly `(subject, predicate, object)`.
    pub fn reifications_of<'a>(
        &'a self,
        subject: &str,
        predicate: &str,
        object: &Object,
    ) -> impl Iterator<Item = &'a ResourceDescription> + 'a {
        let key = (subject.to_string(), predicate.to_string(), object.clone());
        self.reifications
            .get(&key)
            .into_iter()
            .flatten()
            .map(move |idx| &self.graph.resources()[*idx])
    }
}

fn reified_key(statement: &ResourceDescription) -> Option<ReifiedKey> {
    let subject = statement.values(RDF_SUBJECT).first()?.as_reference()?;
    let predicate = statement.values(RDF_PREDICATE).first()?.as_reference()?;
    let object = statement.values(RDF_OBJECT).first()?;
    Some((subject.to_string(), predicate.to_string(), object.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Literal, Triple};
    use crate::vocab::RDF_TYPE;

    fn sample() -> Graph {
        Graph::from_triples(vec![
            Triple::new("http://ex.org/w1", RDF_TYPE, Object::iri("http://ex.org/Widget")),
            Triple::new("http://ex.org/ds/", RDF_TYPE, Object::iri(VOID_DATASET)),
            Triple::new("http://ex.org/st1", RDF_TYPE, Object::iri(RDF_STATEMENT)),
            Triple::new("http://ex.org/st1", RDF_SUBJECT, Object::iri("http://ex.org/w1")),
            Triple::new("http://ex.org/st1", RDF_PREDICATE, Object::iri("http://ex.org/p")),
            Triple::new("http://ex.org/st1", RDF_OBJECT, Literal::simple("v").into()),
            Triple::new("http://ex.org/ds2/", RDF_TYPE, Object::iri(VOID_DATASET)),
            Triple::new("http://ex.org/w2", "http://ex.org/p", Literal::simple("x").into()),
        ])
    }

    #[test]
    fn test_classify_roles() {
        let c = classify(&sample());
        assert_eq!(c.dataset.as_deref(), Some("http://ex.org/ds/"));
        assert_eq!(c.statements, vec!["http://ex.org/st1".to_string()]);
        assert_eq!(
            c.instances,
            vec!["http://ex.org/w1".to_string(), "http://ex.org/w2".to_string()]
        );
        assert_eq!(c.ignored_datasets, vec!["http://ex.org/ds2/".to_string()]);
        assert_eq!(c.role("http://ex.org/st1"), Some(ResourceRole::ReificationStatement));
        assert_eq!(c.role("http://ex.org/ds/"), Some(ResourceRole::DatasetDescription));
        assert_eq!(c.role("http://ex.org/nope"), None);
    }

    #[test]
    fn test_every_subject_gets_exactly_one_role() {
        let graph = sample();
        let c = classify(&graph);
        for r in graph.resources() {
            let hits = [
                c.dataset.as_deref() == Some(r.subject.as_str()),
                c.statements.contains(&r.subject),
                c.instances.contains(&r.subject),
                c.ignored_datasets.contains(&r.subject),
            ]
            .iter()
            .filter(|b| **b)
            .count();
            assert_eq!(hits, 1, "subject {}", r.subject);
        }
    }

    #[test]
    fn test_reification_lookup() {
        let cg = ClassifiedGraph::new(sample());
        let found: Vec<_> = cg
            .reifications_of(
                "http://ex.org/w1",
                "http://ex.org/p",
                &Literal::simple("v").into(),
            )
            .collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subject, "http://ex.org/st1");
        let none = cg
            .reifications_of(
                "http://ex.org/w1",
                "http://ex.org/p",
                &Literal::simple("other").into(),
            )
            .count();
        assert_eq!(none, 0);
        assert_eq!(cg.instances().count(), 2);
        assert_eq!(cg.statements().count(), 1);
    }
    #[test]
    fn test_reification_lookup_matches_the_whole_term() {
        let cg = ClassifiedGraph::new(Graph::from_triples(vec![
            Triple::new("http://ex.org/st1", RDF_TYPE, Object::iri(RDF_STATEMENT)),
            Triple::new("http://ex.org/st1", RDF_SUBJECT, Object::iri("http://ex.org/w1")),
            Triple::new("http://ex.org/st1", RDF_PREDICATE, Object::iri("http://ex.org/p")),
            Triple::new("http://ex.org/st1", RDF_OBJECT, Object::iri("http://ex.org/Acme")),
            Triple::new("http://ex.org/st2", RDF_TYPE, Object::iri(RDF_STATEMENT)),
            Triple::new("http://ex.org/st2", RDF_SUBJECT, Object::iri("http://ex.org/w1")),
            Triple::new("http://ex.org/st2", RDF_PREDICATE, Object::iri("http://ex.org/p")),
            Triple::new("http://ex.org/st2", RDF_OBJECT, Literal::lang("v", "fr").into()),
        ]));
        let lookup = |value: Object| {
            cg.reifications_of("http://ex.org/w1", "http://ex.org/p", &value)
                .map(|r| r.subject.clone())
                .collect::<Vec<_>>()
        };

        assert!(lookup(Literal::simple("http://ex.org/Acme").into()).is_empty());
        assert_eq!(lookup(Object::iri("http://ex.org/Acme")), vec!["http://ex.org/st1"]);
        assert!(lookup(Literal::lang("v", "en").into()).is_empty());
        assert!(lookup(Literal::simple("v").into()).is_empty());
        assert_eq!(lookup(Literal::lang("v", "fr").into()), vec!["http://ex.org/st2"]);
    }
}
