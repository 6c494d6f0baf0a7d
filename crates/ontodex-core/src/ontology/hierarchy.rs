//! Cached super-class closure over an [`OntologySource`].

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ClassHierarchy, Degradation, OntologySource, Resolved};
use crate::cache::{CacheRegion, MemoryCache, SharedCache};
use crate::models::ClassClosure;

/// [`ClassHierarchy`] that walks direct super-class links breadth-first
/// and caches complete closures per class.
///
/// Degraded closures (unknown class, denied or failed lookup) are never
/// cached, so a later lookup can still succeed once the ontology is
/// reachable.
pub struct CachedClassHierarchy {
    source: Arc<dyn OntologySource>,
    root: String,
    local: MemoryCache<ClassClosure>,
    shared: Option<Arc<dyn SharedCache>>,
}

impl CachedClassHierarchy {
    pub fn new(source: Arc<dyn OntologySource>, root: impl Into<String>) -> Self {
        Self {
            source,
            root: root.into(),
            local: MemoryCache::new(),
            shared: None,
        }
    }

    pub fn with_shared_cache(mut self, shared: Arc<dyn SharedCache>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Drop every cached closure, locally and in the shared tier.
    pub async fn invalidate(&self) {
        self.local.clear();
        if let Some(shared) = &self.shared {
            shared.clear(CacheRegion::ClassHierarchy).await;
        }
    }

    pub fn cached_len(&self) -> usize {
        self.local.len()
    }

    fn fallback(&self, class: &str) -> ClassClosure {
        if class == self.root {
            vec![self.root.clone()]
        } else {
            vec![class.to_string(), self.root.clone()]
        }
    }

    async fn from_shared(&self, class: &str) -> Option<Arc<ClassClosure>> {
        let raw = self
            .shared
            .as_ref()?
            .get(CacheRegion::ClassHierarchy, class)
            .await?;
        match serde_json::from_str::<ClassClosure>(&raw) {
            Ok(closure) => Some(Arc::new(closure)),
            Err(e) => {
                debug!(class = %class, error = %e, "discarding unreadable shared closure");
                None
            }
        }
    }

    async fn compute(&self, class: &str) -> Resolved<ClassClosure> {
        let direct = match self.source.super_classes(class).await {
            Ok(Some(direct)) => direct,
            Ok(None) => {
                return Resolved::Degraded {
                    fallback: self.fallback(class),
                    reason: Degradation::Unknown(class.to_string()),
                }
            }
            Err(e) => {
                return Resolved::Degraded {
                    fallback: self.fallback(class),
                    reason: Degradation::Failed(e),
                }
            }
        };

        let mut closure: ClassClosure = vec![class.to_string()];
        let mut queue: VecDeque<String> = direct.into();
        let mut failure = None;

        while let Some(next) = queue.pop_front() {
            if next == self.root || closure.contains(&next) {
                continue;
            }
            if let Some(known) = self.local.get(&next) {
                for ancestor in known.iter() {
                    if *ancestor != self.root && !closure.contains(ancestor) {
                        closure.push(ancestor.clone());
                    }
                }
                continue;
            }
            closure.push(next.clone());
            match self.source.super_classes(&next).await {
                Ok(Some(parents)) => queue.extend(parents),
                // Ancestor defined outside the loaded ontologies: the chain stops here.
                Ok(None) => {}
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        closure.push(self.root.clone());

        match failure {
            None => Resolved::Hit(closure),
            Some(e) => Resolved::Degraded {
                fallback: closure,
                reason: Degradation::Failed(e),
            },
        }
    }
}

#[async_trait]
impl ClassHierarchy for CachedClassHierarchy {
    async fn super_classes(&self, class: &str) -> Resolved<Arc<ClassClosure>> {
        if class == self.root {
            return Resolved::Hit(Arc::new(vec![self.root.clone()]));
        }
        if let Some(hit) = self.local.get(class) {
            return Resolved::Hit(hit);
        }
        if let Some(hit) = self.from_shared(class).await {
            self.local.insert(class.to_string(), hit.clone());
            return Resolved::Hit(hit);
        }

        match self.compute(class).await {
            Resolved::Hit(closure) => {
                let closure = Arc::new(closure);
                self.local.insert(class.to_string(), closure.clone());
                if let Some(shared) = &self.shared {
                    if let Ok(raw) = serde_json::to_string(closure.as_ref()) {
                        shared.put(CacheRegion::ClassHierarchy, class, &raw).await;
                    }
                }
                Resolved::Hit(closure)
            }
            Resolved::Degraded { fallback, reason } => {
                warn!(class = %class, reason = %reason, "class hierarchy degraded");
                Resolved::Degraded {
                    fallback: Arc::new(fallback),
                    reason,
                }
            }
        }
    }

    fn root(&self) -> &str {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemorySharedCache;
    use crate::error::OntologyError;
    use crate::ontology::{MemoryOntology, OntologySnapshot};
    use crate::vocab::OWL_THING;
    use futures::executor::block_on;

    const O: &str = "http://ex.org/onto/";

    fn ontology() -> Arc<MemoryOntology> {
        Arc::new(MemoryOntology::new(
            OntologySnapshot::default()
                .with_class(O, "http://ex.org/Widget", &["http://ex.org/Device"])
                .with_class(O, "http://ex.org/Device", &["http://ex.org/Artifact", OWL_THING])
                .with_class(O, "http://ex.org/Artifact", &[OWL_THING])
                .with_class(O, "http://ex.org/Loop", &["http://ex.org/Loop2"])
                .with_class(O, "http://ex.org/Loop2", &["http://ex.org/Loop"]),
        ))
    }

    #[test]
    fn test_closure_order_and_root_last() {
        let h = CachedClassHierarchy::new(ontology(), OWL_THING);
        let r = block_on(h.super_classes("http://ex.org/Widget"));
        assert!(!r.is_degraded());
        assert_eq!(
            r.value().as_slice(),
            &[
                "http://ex.org/Widget".to_string(),
                "http://ex.org/Device".to_string(),
                "http://ex.org/Artifact".to_string(),
                OWL_THING.to_string(),
            ]
        );
    }

    #[test]
    fn test_cycles_terminate() {
        let h = CachedClassHierarchy::new(ontology(), OWL_THING);
        let r = block_on(h.super_classes("http://ex.org/Loop"));
        assert_eq!(r.value().len(), 3);
        assert_eq!(r.value().last().map(String::as_str), Some(OWL_THING));
    }

    #[test]
    fn test_cached_after_first_lookup() {
        let onto = ontology();
        let h = CachedClassHierarchy::new(onto.clone(), OWL_THING);
        let first = block_on(h.super_classes("http://ex.org/Widget"));
        let calls = onto.class_lookups();
        let second = block_on(h.super_classes("http://ex.org/Widget"));
        assert_eq!(onto.class_lookups(), calls);
        assert_eq!(first.value(), second.value());
    }

    #[test]
    fn test_unknown_class_degrades_and_is_not_cached() {
        let onto = ontology();
        let h = CachedClassHierarchy::new(onto.clone(), OWL_THING);
        let r = block_on(h.super_classes("http://ex.org/Unknown"));
        assert!(matches!(r.degradation(), Some(Degradation::Unknown(_))));
        assert_eq!(
            r.value().as_slice(),
            &["http://ex.org/Unknown".to_string(), OWL_THING.to_string()]
        );
        assert_eq!(h.cached_len(), 0);
    }

    #[test]
    fn test_denied_class_degrades() {
        let onto = ontology();
        onto.deny("http://ex.org/Widget");
        let h = CachedClassHierarchy::new(onto, OWL_THING);
        let r = block_on(h.super_classes("http://ex.org/Widget"));
        assert_eq!(
            r.degradation(),
            Some(&Degradation::Failed(OntologyError::PermissionDenied(
                "http://ex.org/Widget".into()
            )))
        );
        assert!(r.degradation().map(|d| d.is_transient()).unwrap_or(false));
    }

    #[test]
    fn test_shared_tier_is_consulted_and_invalidated() {
        let shared = Arc::new(MemorySharedCache::new());
        let onto = ontology();
        let writer = CachedClassHierarchy::new(onto.clone(), OWL_THING)
            .with_shared_cache(shared.clone());
        block_on(writer.super_classes("http://ex.org/Widget"));
        assert!(!shared.is_empty());

        let reader = CachedClassHierarchy::new(onto.clone(), OWL_THING)
            .with_shared_cache(shared.clone());
        let calls = onto.class_lookups();
        let r = block_on(reader.super_classes("http://ex.org/Widget"));
        assert_eq!(onto.class_lookups(), calls);
        assert_eq!(r.value().len(), 4);

        block_on(reader.invalidate());
        assert!(shared.is_empty());
        assert_eq!(reader.cached_len(), 0);
    }

    #[test]
    fn test_idempotent_under_repeat() {
        let h = CachedClassHierarchy::new(ontology(), OWL_THING);
        let a = block_on(h.super_classes("http://ex.org/Device")).into_value();
        let b = block_on(h.super_classes("http://ex.org/Widget")).into_value();
        let c = block_on(h.super_classes("http://ex.org/Widget")).into_value();
        assert_eq!(b, c);
        assert!(a.iter().all(|x| b.contains(x) || x == "http://ex.org/Widget"));
    }
}
