//! Cached property metadata over an [`OntologySource`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ClassHierarchy, Degradation, OntologySource, PropertyMetadataResolver, Resolved};
use crate::cache::{CacheRegion, MemoryCache, SharedCache};
use crate::models::PropertyMetadata;

/// [`PropertyMetadataResolver`] with an in-process tier, an optional
/// shared tier, and the ontology service as origin.
///
/// Each declared range is widened to its super-class closure, so a
/// property ranging over a subclass also matches checks for the parent
/// class. Results are cached per (scope, predicate) until
/// [`invalidate`](Self::invalidate) is called.
pub struct CachedPropertyResolver {
    source: Arc<dyn OntologySource>,
    hierarchy: Arc<dyn ClassHierarchy>,
    local: MemoryCache<PropertyMetadata>,
    shared: Option<Arc<dyn SharedCache>>,
}

impl CachedPropertyResolver {
    pub fn new(source: Arc<dyn OntologySource>, hierarchy: Arc<dyn ClassHierarchy>) -> Self {
        Self {
            source,
            hierarchy,
            local: MemoryCache::new(),
            shared: None,
        }
    }

    pub fn with_shared_cache(mut self, shared: Arc<dyn SharedCache>) -> Self {
        self.shared = Some(shared);
        self
    }

    pub async fn invalidate(&self) {
        self.local.clear();
        if let Some(shared) = &self.shared {
            shared.clear(CacheRegion::PropertyHierarchy).await;
        }
    }

    pub fn cached_len(&self) -> usize {
        self.local.len()
    }

    async fn from_shared(&self, key: &str) -> Option<Arc<PropertyMetadata>> {
        let raw = self
            .shared
            .as_ref()?
            .get(CacheRegion::PropertyHierarchy, key)
            .await?;
        serde_json::from_str::<PropertyMetadata>(&raw)
            .map(Arc::new)
            .map_err(|e| debug!(key = %key, error = %e, "discarding unreadable shared metadata"))
            .ok()
    }

    async fn store(&self, key: String, metadata: &Arc<PropertyMetadata>) {
        if let Some(shared) = &self.shared {
            if let Ok(raw) = serde_json::to_string(metadata.as_ref()) {
                shared.put(CacheRegion::PropertyHierarchy, &key, &raw).await;
            }
        }
        self.local.insert(key, metadata.clone());
    }
}

#[async_trait]
impl PropertyMetadataResolver for CachedPropertyResolver {
    async fn resolve(&self, predicate: &str, scope: &str) -> Resolved<Arc<PropertyMetadata>> {
        let key = format!("{}|{}", scope, predicate);
        if let Some(hit) = self.local.get(&key) {
            return Resolved::Hit(hit);
        }
        if let Some(hit) = self.from_shared(&key).await {
            self.local.insert(key, hit.clone());
            return Resolved::Hit(hit);
        }

        let description = match self.source.property(predicate, scope).await {
            Ok(Some(description)) => description,
            Ok(None) => {
                debug!(predicate = %predicate, scope = %scope, "no ontology defines predicate");
                return Resolved::Degraded {
                    fallback: Arc::new(PropertyMetadata::default()),
                    reason: Degradation::Unknown(predicate.to_string()),
                };
            }
            Err(e) => {
                warn!(predicate = %predicate, error = %e, "property metadata lookup failed");
                return Resolved::Degraded {
                    fallback: Arc::new(PropertyMetadata::default()),
                    reason: Degradation::Failed(e),
                };
            }
        };

        let mut range = BTreeSet::new();
        let mut complete = true;
        for class in &description.range {
            let closure = self.hierarchy.super_classes(class).await;
            if closure.degradation().map(|d| d.is_transient()).unwrap_or(false) {
                complete = false;
            }
            range.insert(class.clone());
            range.extend(
                closure
                    .value()
                    .iter()
                    .filter(|c| c.as_str() != self.hierarchy.root())
                    .cloned(),
            );
        }

        let metadata = Arc::new(PropertyMetadata {
            cardinality: description.cardinality,
            max_cardinality: description.max_cardinality,
            range,
        });
        if complete {
            self.store(key, &metadata).await;
        } else {
            debug!(predicate = %predicate, "range closure incomplete; not caching metadata");
        }
        Resolved::Hit(metadata)
    }
}
