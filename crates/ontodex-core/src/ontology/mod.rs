//! Ontology-backed metadata for projection.
//!
//! The projector asks two questions of the ontology: what is known about a
//! predicate ([`PropertyMetadataResolver`]) and which classes a type belongs
//! to transitively ([`ClassHierarchy`]). Both answers are cached and both
//! degrade instead of failing: an unknown predicate resolves to
//! [`PropertyMetadata::default`], an unknown class to itself plus the root
//! type.
//!
//! The origin of those answers is an [`OntologySource`]: an HTTP ontology
//! service, a snapshot file written by the ontology-ingestion job, or the
//! in-memory [`MemoryOntology`].

pub mod hierarchy;
pub mod memory;
pub mod property;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OntologyError;
use crate::models::{ClassClosure, PropertyMetadata};

pub use hierarchy::CachedClassHierarchy;
pub use memory::{MemoryOntology, OntologySnapshot};
pub use property::CachedPropertyResolver;

/// Scope value meaning "any loaded ontology".
pub const ANY_SCOPE: &str = "*";

/// Asserted facts about a property, as the ontology service reports them.
///
/// Ranges are direct; closure over the class hierarchy happens in the
/// resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescription {
    #[serde(default)]
    pub cardinality: Option<u32>,
    #[serde(default)]
    pub max_cardinality: Option<u32>,
    #[serde(default)]
    pub range: Vec<String>,
}

/// Origin of ontology facts.
#[async_trait]
pub trait OntologySource: Send + Sync {
    /// Facts about `predicate` within the ontology `scope`.
    ///
    /// `Ok(None)` when no ontology in scope defines the predicate.
    async fn property(
        &self,
        predicate: &str,
        scope: &str,
    ) -> Result<Option<PropertyDescription>, OntologyError>;

    /// Direct super-classes of `class`. `Ok(None)` when the class is unknown.
    async fn super_classes(&self, class: &str) -> Result<Option<Vec<String>>, OntologyError>;
}

/// Why a lookup fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// Nothing in the ontology describes the term.
    Unknown(String),
    /// The ontology service failed; the answer may exist later.
    Failed(OntologyError),
}

impl Degradation {
    /// Whether a retry later could produce a different answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, Degradation::Failed(_))
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::Unknown(term) => write!(f, "no ontology defines <{}>", term),
            Degradation::Failed(err) => write!(f, "{}", err),
        }
    }
}

/// Soft-degraded result of an ontology lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    Hit(T),
    Degraded { fallback: T, reason: Degradation },
}

impl<T> Resolved<T> {
    pub fn value(&self) -> &T {
        match self {
            Resolved::Hit(v) => v,
            Resolved::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Resolved::Hit(v) => v,
            Resolved::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn degradation(&self) -> Option<&Degradation> {
        match self {
            Resolved::Hit(_) => None,
            Resolved::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degradation().is_some()
    }
}

/// Cardinality and range of predicates.
#[async_trait]
pub trait PropertyMetadataResolver: Send + Sync {
    async fn resolve(&self, predicate: &str, scope: &str) -> Resolved<Arc<PropertyMetadata>>;
}

/// Super-class closure of classes.
#[async_trait]
pub trait ClassHierarchy: Send + Sync {
    /// The class itself, its ancestors, and the root type, de-duplicated.
    async fn super_classes(&self, class: &str) -> Resolved<Arc<ClassClosure>>;

    fn root(&self) -> &str;
}
