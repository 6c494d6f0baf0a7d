//! # Ontodex
//!
//! Projects multi-tenant RDF data into a flat, schema-flexible search
//! index, and keeps the triple store and the index in step.
//!
//! The runtime-independent logic (classification, ontology resolution,
//! field projection, the write coordinators) lives in `ontodex-core`.
//! This crate supplies the native backends and the `odx` CLI around it.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ RDF file   │──▶│  Classifier  │──▶│  Graph store   │
//! │ ttl/nt/xml │   │  + Projector │   │ memory/SPARQL  │
//! └────────────┘   └──────┬───────┘   └────────────────┘
//!                         │
//!           ontology ◀────┤
//!      snapshot/HTTP      ▼
//!                  ┌──────────────┐
//!                  │ Search index │
//!                  │ SQLite/Solr  │
//!                  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`rdf_input`] | RDF parsing into the core graph model |
//! | [`pipeline`] | Submission pipeline and background tasks |
//! | [`engine`] | Backend wiring from config |
//! | [`sqlite_index`] | SQLite document index |
//! | [`sqlite_cache`] | SQLite shared metadata cache |
//! | [`solr`] | Solr document index |
//! | [`sparql`] | SPARQL graph store |
//! | [`ontology_source`] | Ontology service, snapshot and timeouts |
//! | [`cache_registry`] | Cache invalidation fan-out |
//! | [`search`] | Keyword search with facets |
//! | [`get`] | Stored document and field schema reads |
//! | [`submit`] | `index` and `project` commands |

pub mod cache_registry;
pub mod config;
pub mod db;
pub mod engine;
pub mod get;
pub mod migrate;
pub mod ontology_source;
pub mod pipeline;
pub mod rdf_input;
pub mod search;
pub mod solr;
pub mod sparql;
pub mod sqlite_cache;
pub mod sqlite_index;
pub mod submit;
