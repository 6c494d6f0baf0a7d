use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use ontodex_core::cache::{CacheInvalidator, CacheRegion, SharedCache};
use ontodex_core::ontology::{CachedClassHierarchy, CachedPropertyResolver};

/// [`CacheInvalidator`] over every cache this process owns.
///
/// Ontology regions drop the resolver caches (both tiers); the other
/// regions drop their rows from the shared tier.
#[derive(Default)]
pub struct CacheRegistry {
    properties: Option<Arc<CachedPropertyResolver>>,
    classes: Option<Arc<CachedClassHierarchy>>,
    shared: Option<Arc<dyn SharedCache>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolvers(
        mut self,
        properties: Arc<CachedPropertyResolver>,
        classes: Arc<CachedClassHierarchy>,
    ) -> Self {
        self.properties = Some(properties);
        self.classes = Some(classes);
        self
    }

    pub fn with_shared(mut self, shared: Arc<dyn SharedCache>) -> Self {
        self.shared = Some(shared);
        self
    }
}

#[async_trait]
impl CacheInvalidator for CacheRegistry {
    async fn invalidate(&self, region: CacheRegion) {
        match region {
            CacheRegion::PropertyHierarchy => {
                if let Some(p) = &self.properties {
                    p.invalidate().await;
                } else if let Some(shared) = &self.shared {
                    shared.clear(region).await;
                }
            }
            CacheRegion::ClassHierarchy => {
                if let Some(c) = &self.classes {
                    c.invalidate().await;
                } else if let Some(shared) = &self.shared {
                    shared.clear(region).await;
                }
            }
            _ => {
                if let Some(shared) = &self.shared {
                    shared.clear(region).await;
                }
            }
        }
        info!(region = %region, "cache region invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontodex_core::cache::MemorySharedCache;
    use ontodex_core::ontology::{ClassHierarchy, MemoryOntology, OntologySnapshot};
    use ontodex_core::vocab::OWL_THING;

    #[tokio::test]
    async fn test_ontology_region_clears_resolver_cache() {
        let snapshot = OntologySnapshot::default().with_class(
            "http://ex.org/onto/",
            "http://ex.org/B",
            &["http://ex.org/A"],
        );
        let source = Arc::new(MemoryOntology::new(snapshot));
        let classes = Arc::new(CachedClassHierarchy::new(source.clone(), OWL_THING));
        let properties = Arc::new(CachedPropertyResolver::new(source.clone(), classes.clone()));
        let registry = CacheRegistry::new().with_resolvers(properties, classes.clone());

        classes.super_classes("http://ex.org/B").await;
        assert!(classes.cached_len() > 0);

        registry.invalidate(CacheRegion::Search).await;
        assert!(classes.cached_len() > 0);

        registry.invalidate(CacheRegion::ClassHierarchy).await;
        assert_eq!(classes.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_write_regions_clear_shared_rows() {
        let shared = Arc::new(MemorySharedCache::new());
        shared.put(CacheRegion::Search, "q", "1").await;
        shared.put(CacheRegion::Sparql, "q", "1").await;
        let registry = CacheRegistry::new().with_shared(shared.clone());

        registry.invalidate(CacheRegion::Search).await;
        assert!(shared.get(CacheRegion::Search, "q").await.is_none());
        assert!(shared.get(CacheRegion::Sparql, "q").await.is_some());
    }
}
