//! TOML configuration.
//!
//! Every deployment setting the engine uses is read here and threaded
//! through constructors; nothing reads ambient state. See
//! `config/odx.example.toml` for a complete file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use ontodex_core::project::ProjectionConfig;
use ontodex_core::store::DEFAULT_CHUNK_SIZE;
use ontodex_core::vocab::OWL_THING;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub projection: ProjectionSettings,
    #[serde(default)]
    pub ontology: OntologyConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub graph_store: GraphStoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectionSettings {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub geo_enabled: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            geo_enabled: false,
            workers: default_workers(),
        }
    }
}

impl ProjectionSettings {
    pub fn projection_config(&self) -> ProjectionConfig {
        ProjectionConfig::new(self.languages.clone(), self.geo_enabled)
    }
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}
fn default_workers() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct OntologyConfig {
    /// `snapshot`, `http`, or `none`.
    #[serde(default = "default_ontology_source")]
    pub source: String,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_ontology_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_root_class")]
    pub root_class: String,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            source: default_ontology_source(),
            snapshot_path: default_snapshot_path(),
            url: None,
            timeout_ms: default_ontology_timeout_ms(),
            root_class: default_root_class(),
        }
    }
}

fn default_ontology_source() -> String {
    "snapshot".to_string()
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./data/ontology.json")
}
fn default_ontology_timeout_ms() -> u64 {
    2000
}
fn default_root_class() -> String {
    OWL_THING.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `sqlite`, `solr`, or `memory`.
    #[serde(default = "default_index_backend")]
    pub backend: String,
    #[serde(default)]
    pub autocommit: bool,
    #[serde(default)]
    pub solr: Option<SolrConfig>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            autocommit: false,
            solr: None,
        }
    }
}

fn default_index_backend() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SolrConfig {
    pub url: String,
    pub core: String,
    #[serde(default = "default_fields_index_path")]
    pub fields_index_path: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_fields_index_path() -> PathBuf {
    PathBuf::from("./data/solr-fields.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphStoreConfig {
    /// `memory` or `sparql`.
    #[serde(default = "default_graph_store_backend")]
    pub backend: String,
    #[serde(default)]
    pub query_url: Option<String>,
    #[serde(default)]
    pub update_url: Option<String>,
    #[serde(default)]
    pub graph_store_url: Option<String>,
    /// `incremental` or `bulk`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_graph_store_backend(),
            query_url: None,
            update_url: None,
            graph_store_url: None,
            strategy: default_strategy(),
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_graph_store_backend() -> String {
    "memory".to_string()
}
fn default_strategy() -> String {
    "incremental".to_string()
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Back the shared tier with the SQLite database.
    #[serde(default)]
    pub shared: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shared: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Smallest valid configuration: everything defaulted around a database path.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            projection: ProjectionSettings::default(),
            ontology: OntologyConfig::default(),
            index: IndexConfig::default(),
            graph_store: GraphStoreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate projection
    if config.projection.languages.is_empty() {
        bail!("projection.languages must list at least one language");
    }
    if config.projection.languages.iter().any(|l| l.trim().is_empty()) {
        bail!("projection.languages must not contain empty entries");
    }
    if config.projection.workers == 0 {
        bail!("projection.workers must be > 0");
    }

    // Validate ontology
    match config.ontology.source.as_str() {
        "snapshot" | "none" => {}
        "http" => {
            if config.ontology.url.is_none() {
                bail!("ontology.url must be set when source is 'http'");
            }
        }
        other => bail!(
            "Unknown ontology source: '{}'. Must be snapshot, http, or none.",
            other
        ),
    }
    if config.ontology.timeout_ms == 0 {
        bail!("ontology.timeout_ms must be > 0");
    }

    // Validate index
    match config.index.backend.as_str() {
        "sqlite" | "memory" => {}
        "solr" => {
            if config.index.solr.is_none() {
                bail!("[index.solr] must be configured when backend is 'solr'");
            }
        }
        other => bail!(
            "Unknown index backend: '{}'. Must be sqlite, solr, or memory.",
            other
        ),
    }

    // Validate graph store
    let gs = &config.graph_store;
    if gs.chunk_size == 0 {
        bail!("graph_store.chunk_size must be > 0");
    }
    match gs.strategy.as_str() {
        "incremental" | "bulk" => {}
        other => bail!(
            "Unknown graph_store.strategy: '{}'. Must be incremental or bulk.",
            other
        ),
    }
    match gs.backend.as_str() {
        "memory" => {}
        "sparql" => {
            if gs.query_url.is_none() {
                bail!("graph_store.query_url must be set when backend is 'sparql'");
            }
            if gs.strategy == "bulk" && gs.graph_store_url.is_none() {
                bail!("graph_store.graph_store_url must be set for the bulk strategy");
            }
            if gs.strategy == "incremental" && gs.update_url.is_none() {
                bail!("graph_store.update_url must be set for the incremental strategy");
            }
        }
        other => bail!(
            "Unknown graph_store backend: '{}'. Must be memory or sparql.",
            other
        ),
    }

    Ok(())
}
