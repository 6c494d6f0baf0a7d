//! Wiring of configured backends into an [`IndexingPipeline`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use ontodex_core::cache::{CacheInvalidator, NoopInvalidator, SharedCache};
use ontodex_core::index::{DocumentIndex, IndexWriteCoordinator, MemoryDocumentIndex};
use ontodex_core::ontology::{
    CachedClassHierarchy, CachedPropertyResolver, MemoryOntology, OntologySnapshot, OntologySource,
};
use ontodex_core::project::FieldProjector;
use ontodex_core::store::{GraphStore, LoadStrategy, MemoryGraphStore};

use crate::cache_registry::CacheRegistry;
use crate::config::Config;
use crate::db;
use crate::ontology_source::{load_snapshot, HttpOntologySource, TimeoutOntologySource};
use crate::pipeline::IndexingPipeline;
use crate::solr::SolrIndex;
use crate::sparql::SparqlGraphStore;
use crate::sqlite_cache::SqliteSharedCache;
use crate::sqlite_index::SqliteIndex;

/// Everything a command needs, built once from the config.
pub struct Engine {
    pub pipeline: Arc<IndexingPipeline>,
    pub invalidator: Arc<dyn CacheInvalidator>,
    pub pool: Option<SqlitePool>,
}

impl Engine {
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}

pub async fn build_engine(config: &Config) -> Result<Engine> {
    let needs_db = config.index.backend == "sqlite" || (config.cache.enabled && config.cache.shared);
    let pool = if needs_db {
        Some(db::connect(config).await?)
    } else {
        None
    };

    let shared: Option<Arc<dyn SharedCache>> = match (&pool, config.cache.enabled && config.cache.shared) {
        (Some(pool), true) => Some(Arc::new(SqliteSharedCache::new(pool.clone()))),
        _ => None,
    };

    // Ontology
    let source = ontology_source(config)?;
    let mut classes = CachedClassHierarchy::new(source.clone(), config.ontology.root_class.as_str());
    if let Some(shared) = &shared {
        classes = classes.with_shared_cache(shared.clone());
    }
    let classes = Arc::new(classes);
    let mut properties = CachedPropertyResolver::new(source, classes.clone());
    if let Some(shared) = &shared {
        properties = properties.with_shared_cache(shared.clone());
    }
    let properties = Arc::new(properties);

    let invalidator: Arc<dyn CacheInvalidator> = if config.cache.enabled {
        let mut registry = CacheRegistry::new().with_resolvers(properties.clone(), classes.clone());
        if let Some(shared) = &shared {
            registry = registry.with_shared(shared.clone());
        }
        Arc::new(registry)
    } else {
        Arc::new(NoopInvalidator)
    };

    // Index
    let index: Arc<dyn DocumentIndex> = match config.index.backend.as_str() {
        "sqlite" => match &pool {
            Some(pool) => Arc::new(SqliteIndex::new(pool.clone(), config.index.autocommit)),
            None => bail!("sqlite index requires a database connection"),
        },
        "solr" => {
            let solr = config
                .index
                .solr
                .as_ref()
                .context("[index.solr] must be configured when backend is 'solr'")?;
            Arc::new(SolrIndex::from_config(solr, config.index.autocommit)?)
        }
        "memory" => {
            let index = MemoryDocumentIndex::new();
            if config.index.autocommit {
                Arc::new(index.with_autocommit())
            } else {
                Arc::new(index)
            }
        }
        other => bail!("Unknown index backend: '{}'", other),
    };

    // Graph store
    let store: Arc<dyn GraphStore> = match config.graph_store.backend.as_str() {
        "memory" => {
            let strategy = match config.graph_store.strategy.as_str() {
                "bulk" => LoadStrategy::Bulk,
                _ => LoadStrategy::Incremental {
                    chunk_size: config.graph_store.chunk_size,
                },
            };
            Arc::new(MemoryGraphStore::new().with_strategy(strategy))
        }
        "sparql" => Arc::new(SparqlGraphStore::from_config(&config.graph_store)?),
        other => bail!("Unknown graph_store backend: '{}'", other),
    };

    let projector = FieldProjector::new(
        config.projection.projection_config(),
        properties,
        classes,
    );
    let writer = IndexWriteCoordinator::new(index, invalidator.clone(), config.index.autocommit);
    let pipeline = IndexingPipeline::new(store, projector, writer, config.projection.workers);
    debug!(
        index = %config.index.backend,
        graph_store = %config.graph_store.backend,
        ontology = %config.ontology.source,
        "engine built"
    );

    Ok(Engine {
        pipeline: Arc::new(pipeline),
        invalidator,
        pool,
    })
}

fn ontology_source(config: &Config) -> Result<Arc<dyn OntologySource>> {
    let inner: Arc<dyn OntologySource> = match config.ontology.source.as_str() {
        "snapshot" => Arc::new(MemoryOntology::new(load_snapshot(
            &config.ontology.snapshot_path,
        )?)),
        "http" => {
            let url = config
                .ontology
                .url
                .as_deref()
                .context("ontology.url must be set when source is 'http'")?;
            Arc::new(HttpOntologySource::new(url)?)
        }
        "none" => Arc::new(MemoryOntology::new(OntologySnapshot::default())),
        other => bail!("Unknown ontology source: '{}'", other),
    };
    Ok(Arc::new(TimeoutOntologySource::new(
        inner,
        Duration::from_millis(config.ontology.timeout_ms),
    )))
}
