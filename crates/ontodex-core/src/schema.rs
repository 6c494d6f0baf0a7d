//! Tracking of field names the document index has not seen yet.

use std::collections::{BTreeSet, HashSet};

use crate::models::IndexDocument;

/// Per-batch view of the index's dynamic field schema.
///
/// Seeded with the field set known at batch start. Each unknown name is
/// reported as new exactly once, so the batch ends with a single schema
/// refresh however many documents introduce the same field.
#[derive(Debug, Clone, Default)]
pub struct DynamicSchemaGuard {
    known: HashSet<String>,
    new_fields: Vec<String>,
}

impl DynamicSchemaGuard {
    pub fn begin_batch(known: impl IntoIterator<Item = String>) -> Self {
        Self {
            known: known.into_iter().collect(),
            new_fields: Vec::new(),
        }
    }

    /// `true` the first time an unknown field name is seen in this batch.
    pub fn check_and_record(&mut self, name: &str) -> bool {
        if self.known.contains(name) {
            return false;
        }
        self.known.insert(name.to_string());
        self.new_fields.push(name.to_string());
        true
    }

    /// Record every field of `document`; returns how many were new.
    pub fn observe(&mut self, document: &IndexDocument) -> usize {
        document
            .fields
            .iter()
            .filter(|f| self.check_and_record(&f.name))
            .count()
    }

    pub fn needs_refresh(&self) -> bool {
        !self.new_fields.is_empty()
    }

    /// New names in first-seen order.
    pub fn new_fields(&self) -> &[String] {
        &self.new_fields
    }

    pub fn known(&self) -> BTreeSet<&str> {
        self.known.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_field_flagged_once() {
        let mut guard = DynamicSchemaGuard::begin_batch(vec!["uri".to_string()]);
        assert!(!guard.check_and_record("uri"));
        assert!(guard.check_and_record("prefLabel_en"));
        assert!(!guard.check_and_record("prefLabel_en"));
        assert!(!guard.check_and_record("prefLabel_en"));
        assert_eq!(guard.new_fields(), &["prefLabel_en".to_string()]);
        assert!(guard.needs_refresh());
    }

    #[test]
    fn test_observe_document() {
        let mut guard = DynamicSchemaGuard::begin_batch(vec!["uri".to_string()]);
        let mut doc = IndexDocument::new("http://ex.org/ds/", "http://ex.org/a");
        doc.push("uri", "http://ex.org/a", false);
        doc.push("type", "http://ex.org/T", true);
        doc.push("type", "http://ex.org/U", true);
        assert_eq!(guard.observe(&doc), 1);
        assert_eq!(guard.observe(&doc), 0);
        assert!(guard.known().contains("type"));
    }

    #[test]
    fn test_no_refresh_when_nothing_new() {
        let guard = DynamicSchemaGuard::begin_batch(Vec::new());
        assert!(!guard.needs_refresh());
    }
}
