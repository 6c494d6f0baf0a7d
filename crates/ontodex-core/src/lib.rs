//! # Ontodex Core
//!
//! Runtime-independent logic for ontodex: the RDF resource model,
//! classification of submitted graphs, ontology-backed metadata
//! resolution, projection of resources into search documents, and the
//! coordinators that write to the triple store and the document index.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Backends are reached through the
//! [`store::GraphStore`], [`index::DocumentIndex`],
//! [`ontology::OntologySource`] and [`cache::SharedCache`] traits; each
//! has an in-memory implementation here.

pub mod cache;
pub mod classify;
pub mod error;
pub mod fields;
pub mod geo;
pub mod index;
pub mod labels;
pub mod models;
pub mod ontology;
pub mod project;
pub mod schema;
pub mod store;
pub mod vocab;
