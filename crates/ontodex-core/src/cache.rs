//! Named cache regions and the pluggable cache tiers behind the resolvers.
//!
//! Two tiers back ontology lookups: a per-process [`MemoryCache`] and an
//! optional [`SharedCache`] reachable by every writer. Both are keyed by
//! [`CacheRegion`] so an invalidation signal can drop exactly one kind of
//! cached state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

/// Fixed set of cache regions an invalidation signal can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRegion {
    RevisionRead,
    RevisionLister,
    Search,
    Sparql,
    CrudRead,
    PropertyHierarchy,
    ClassHierarchy,
}

impl CacheRegion {
    pub const ALL: [CacheRegion; 7] = [
        CacheRegion::RevisionRead,
        CacheRegion::RevisionLister,
        CacheRegion::Search,
        CacheRegion::Sparql,
        CacheRegion::CrudRead,
        CacheRegion::PropertyHierarchy,
        CacheRegion::ClassHierarchy,
    ];

    /// Regions whose content goes stale when a dataset is written.
    pub const AFTER_WRITE: [CacheRegion; 5] = [
        CacheRegion::RevisionRead,
        CacheRegion::RevisionLister,
        CacheRegion::Search,
        CacheRegion::Sparql,
        CacheRegion::CrudRead,
    ];

    /// Regions whose content goes stale when an ontology changes.
    pub const AFTER_ONTOLOGY_CHANGE: [CacheRegion; 2] =
        [CacheRegion::PropertyHierarchy, CacheRegion::ClassHierarchy];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheRegion::RevisionRead => "revision-read",
            CacheRegion::RevisionLister => "revision-lister",
            CacheRegion::Search => "search",
            CacheRegion::Sparql => "sparql",
            CacheRegion::CrudRead => "crud-read",
            CacheRegion::PropertyHierarchy => "ontology-property-hierarchy",
            CacheRegion::ClassHierarchy => "ontology-class-hierarchy",
        }
    }
}

impl fmt::Display for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheRegion::ALL
            .iter()
            .find(|r| r.as_str() == s)
            .copied()
            .ok_or_else(|| {
                let names: Vec<&str> = CacheRegion::ALL.iter().map(|r| r.as_str()).collect();
                format!("unknown cache region '{}'. Must be one of: {}", s, names.join(", "))
            })
    }
}

/// Receives invalidation signals for named regions.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, region: CacheRegion);
}

/// Invalidator used when caching is disabled.
pub struct NoopInvalidator;

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn invalidate(&self, _region: CacheRegion) {}
}

/// Records every invalidation, in order.
#[derive(Default)]
pub struct RecordingInvalidator {
    seen: RwLock<Vec<CacheRegion>>,
}

impl RecordingInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<CacheRegion> {
        self.seen.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate(&self, region: CacheRegion) {
        if let Ok(mut seen) = self.seen.write() {
            seen.push(region);
        }
    }
}

/// Cross-process cache tier. Values are JSON-encoded strings.
///
/// Backend failures are reported as misses; a shared cache is never
/// allowed to fail an indexing request.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, region: CacheRegion, key: &str) -> Option<String>;
    async fn put(&self, region: CacheRegion, key: &str, value: &str);
    async fn clear(&self, region: CacheRegion);
}

/// [`SharedCache`] over a process-local map, for tests and single-node use.
#[derive(Default)]
pub struct MemorySharedCache {
    inner: RwLock<HashMap<(CacheRegion, String), String>>,
}

impl MemorySharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SharedCache for MemorySharedCache {
    async fn get(&self, region: CacheRegion, key: &str) -> Option<String> {
        self.inner.read().ok()?.get(&(region, key.to_string())).cloned()
    }

    async fn put(&self, region: CacheRegion, key: &str, value: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.insert((region, key.to_string()), value.to_string());
        }
    }

    async fn clear(&self, region: CacheRegion) {
        if let Ok(mut inner) = self.inner.write() {
            inner.retain(|(r, _), _| *r != region);
        }
    }
}

/// In-process cache tier.
///
/// Reads take a shared lock; concurrent fills of the same key are
/// last-write-wins, which is harmless because values are derived from the
/// same ontology state. A poisoned lock reads as a miss.
pub struct MemoryCache<T> {
    inner: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> MemoryCache<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.inner.read().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: String, value: Arc<T>) {
        if let Ok(mut cache) = self.inner.write() {
            cache.insert(key, value);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.inner.write() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemoryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_region_names_round_trip() {
        for region in CacheRegion::ALL {
            assert_eq!(region.as_str().parse::<CacheRegion>().unwrap(), region);
        }
        assert!("bogus".parse::<CacheRegion>().is_err());
    }

    #[test]
    fn test_memory_cache_insert_get_clear() {
        let cache: MemoryCache<String> = MemoryCache::new();
        assert!(cache.get("a").is_none());
        cache.insert("a".into(), Arc::new("x".into()));
        assert_eq!(cache.get("a").as_deref().map(String::as_str), Some("x"));
        cache.insert("a".into(), Arc::new("y".into()));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_cache_clear_is_region_scoped() {
        let cache = MemorySharedCache::new();
        block_on(async {
            cache.put(CacheRegion::ClassHierarchy, "k", "1").await;
            cache.put(CacheRegion::PropertyHierarchy, "k", "2").await;
            cache.clear(CacheRegion::ClassHierarchy).await;
            assert!(cache.get(CacheRegion::ClassHierarchy, "k").await.is_none());
            assert_eq!(
                cache.get(CacheRegion::PropertyHierarchy, "k").await.as_deref(),
                Some("2")
            );
        });
    }
}
