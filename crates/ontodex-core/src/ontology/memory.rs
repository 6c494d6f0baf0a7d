//! In-memory [`OntologySource`] and the snapshot format it loads.
//!
//! The snapshot is the serialized class/property hierarchy the external
//! ontology-ingestion job writes. An empty snapshot is valid: every lookup
//! against it reports "unknown" and projection falls back to defaults.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{OntologySource, PropertyDescription, ANY_SCOPE};
use crate::error::OntologyError;

/// Serialized class and property hierarchies, keyed by ontology IRI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologySnapshot {
    #[serde(default)]
    pub ontologies: BTreeMap<String, OntologyEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyEntry {
    #[serde(default)]
    pub classes: BTreeMap<String, ClassEntry>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDescription>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    #[serde(default)]
    pub super_classes: Vec<String>,
}

impl OntologySnapshot {
    pub fn with_class(mut self, ontology: &str, class: &str, super_classes: &[&str]) -> Self {
        self.ontologies
            .entry(ontology.to_string())
            .or_default()
            .classes
            .insert(
                class.to_string(),
                ClassEntry {
                    super_classes: super_classes.iter().map(|s| s.to_string()).collect(),
                },
            );
        self
    }

    pub fn with_property(
        mut self,
        ontology: &str,
        predicate: &str,
        description: PropertyDescription,
    ) -> Self {
        self.ontologies
            .entry(ontology.to_string())
            .or_default()
            .properties
            .insert(predicate.to_string(), description);
        self
    }

    fn property(&self, predicate: &str, scope: &str) -> Option<PropertyDescription> {
        if scope == ANY_SCOPE {
            self.ontologies
                .values()
                .find_map(|o| o.properties.get(predicate))
                .cloned()
        } else {
            self.ontologies
                .get(scope)
                .and_then(|o| o.properties.get(predicate))
                .cloned()
        }
    }

    fn super_classes(&self, class: &str) -> Option<Vec<String>> {
        let mut found = false;
        let mut out: Vec<String> = Vec::new();
        for entry in self.ontologies.values() {
            if let Some(c) = entry.classes.get(class) {
                found = true;
                for parent in &c.super_classes {
                    if !out.contains(parent) {
                        out.push(parent.clone());
                    }
                }
            }
        }
        found.then_some(out)
    }
}

/// [`OntologySource`] over an [`OntologySnapshot`] held in memory.
///
/// Counts origin lookups so caching layers can be tested, and can be told
/// to deny specific terms to simulate permission failures.
#[derive(Default)]
pub struct MemoryOntology {
    snapshot: RwLock<OntologySnapshot>,
    denied: RwLock<HashSet<String>>,
    property_lookups: AtomicUsize,
    class_lookups: AtomicUsize,
}

impl MemoryOntology {
    pub fn new(snapshot: OntologySnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    /// Swap in a new snapshot (an ontology mutation).
    pub fn replace(&self, snapshot: OntologySnapshot) {
        if let Ok(mut current) = self.snapshot.write() {
            *current = snapshot;
        }
    }

    pub fn deny(&self, term: &str) {
        if let Ok(mut denied) = self.denied.write() {
            denied.insert(term.to_string());
        }
    }

    pub fn property_lookups(&self) -> usize {
        self.property_lookups.load(Ordering::Relaxed)
    }

    pub fn class_lookups(&self) -> usize {
        self.class_lookups.load(Ordering::Relaxed)
    }

    fn check_access(&self, term: &str) -> Result<(), OntologyError> {
        let denied = self
            .denied
            .read()
            .map(|d| d.contains(term))
            .unwrap_or(false);
        if denied {
            Err(OntologyError::PermissionDenied(term.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OntologySource for MemoryOntology {
    async fn property(
        &self,
        predicate: &str,
        scope: &str,
    ) -> Result<Option<PropertyDescription>, OntologyError> {
        self.property_lookups.fetch_add(1, Ordering::Relaxed);
        self.check_access(predicate)?;
        let snapshot = self
            .snapshot
            .read()
            .map_err(|_| OntologyError::Unavailable("snapshot lock poisoned".into()))?;
        Ok(snapshot.property(predicate, scope))
    }

    async fn super_classes(&self, class: &str) -> Result<Option<Vec<String>>, OntologyError> {
        self.class_lookups.fetch_add(1, Ordering::Relaxed);
        self.check_access(class)?;
        let snapshot = self
            .snapshot
            .read()
            .map_err(|_| OntologyError::Unavailable("snapshot lock poisoned".into()))?;
        Ok(snapshot.super_classes(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_scoped_property_lookup() {
        let snapshot = OntologySnapshot::default()
            .with_property(
                "http://ex.org/onto/a/",
                "http://ex.org/p",
                PropertyDescription {
                    max_cardinality: Some(1),
                    ..Default::default()
                },
            )
            .with_property(
                "http://ex.org/onto/b/",
                "http://ex.org/p",
                PropertyDescription::default(),
            );
        let onto = MemoryOntology::new(snapshot);
        block_on(async {
            let a = onto.property("http://ex.org/p", "http://ex.org/onto/a/").await.unwrap();
            assert_eq!(a.unwrap().max_cardinality, Some(1));
            let b = onto.property("http://ex.org/p", "http://ex.org/onto/b/").await.unwrap();
            assert_eq!(b.unwrap().max_cardinality, None);
            let any = onto.property("http://ex.org/p", ANY_SCOPE).await.unwrap();
            assert_eq!(any.unwrap().max_cardinality, Some(1));
            let missing = onto.property("http://ex.org/p", "http://ex.org/nope/").await.unwrap();
            assert!(missing.is_none());
        });
        assert_eq!(onto.property_lookups(), 4);
    }

    #[test]
    fn test_super_classes_merge_across_ontologies() {
        let snapshot = OntologySnapshot::default()
            .with_class("http://ex.org/o1/", "http://ex.org/C", &["http://ex.org/A"])
            .with_class("http://ex.org/o2/", "http://ex.org/C", &["http://ex.org/B", "http://ex.org/A"]);
        let onto = MemoryOntology::new(snapshot);
        let supers = block_on(onto.super_classes("http://ex.org/C")).unwrap().unwrap();
        assert_eq!(supers, vec!["http://ex.org/A".to_string(), "http://ex.org/B".to_string()]);
        assert!(block_on(onto.super_classes("http://ex.org/Z")).unwrap().is_none());
    }

    #[test]
    fn test_denied_terms() {
        let onto = MemoryOntology::new(OntologySnapshot::default());
        onto.deny("http://ex.org/Secret");
        let err = block_on(onto.super_classes("http://ex.org/Secret")).unwrap_err();
        assert_eq!(err, OntologyError::PermissionDenied("http://ex.org/Secret".into()));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = r#"{
            "ontologies": {
                "http://ex.org/onto/": {
                    "classes": { "http://ex.org/Widget": { "super_classes": ["http://ex.org/Thing"] } },
                    "properties": { "http://ex.org/weight": { "max_cardinality": 1, "range": ["http://www.w3.org/2001/XMLSchema#float"] } }
                }
            }
        }"#;
        let snapshot: OntologySnapshot = serde_json::from_str(json).unwrap();
        let entry = &snapshot.ontologies["http://ex.org/onto/"];
        assert_eq!(entry.classes["http://ex.org/Widget"].super_classes.len(), 1);
        assert_eq!(entry.properties["http://ex.org/weight"].max_cardinality, Some(1));
    }
}
