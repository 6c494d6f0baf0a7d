//! Ontology origins for the resolvers: the read service over HTTP, the
//! snapshot file, and a timeout wrapper for either.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use ontodex_core::error::OntologyError;
use ontodex_core::ontology::{OntologySnapshot, OntologySource, PropertyDescription, ANY_SCOPE};

/// JSON ontology read service.
///
/// - `GET {url}/property?uri=<predicate>[&ontology=<scope>]` → [`PropertyDescription`]
/// - `GET {url}/class?uri=<class>` → `{"super_classes": [...]}`
///
/// 404 means the term is unknown. 403 is reported as
/// [`OntologyError::PermissionDenied`]; both degrade the lookup.
pub struct HttpOntologySource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ClassResponse {
    #[serde(default)]
    super_classes: Vec<String>,
}

impl HttpOntologySource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build ontology HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        term: &str,
    ) -> Result<Option<T>, OntologyError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| OntologyError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::FORBIDDEN => return Err(OntologyError::PermissionDenied(term.to_string())),
            s if !s.is_success() => {
                return Err(OntologyError::Unavailable(format!("ontology service returned {}", s)))
            }
            _ => {}
        }
        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| OntologyError::Malformed(e.to_string()))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl OntologySource for HttpOntologySource {
    async fn property(
        &self,
        predicate: &str,
        scope: &str,
    ) -> Result<Option<PropertyDescription>, OntologyError> {
        let mut params = vec![("uri", predicate)];
        if scope != ANY_SCOPE {
            params.push(("ontology", scope));
        }
        self.fetch("property", &params, predicate).await
    }

    async fn super_classes(&self, class: &str) -> Result<Option<Vec<String>>, OntologyError> {
        let response: Option<ClassResponse> = self.fetch("class", &[("uri", class)], class).await?;
        Ok(response.map(|r| r.super_classes))
    }
}

/// Bounds every lookup of the wrapped source by a request-scoped timeout.
pub struct TimeoutOntologySource {
    inner: Arc<dyn OntologySource>,
    timeout: Duration,
}

impl TimeoutOntologySource {
    pub fn new(inner: Arc<dyn OntologySource>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl OntologySource for TimeoutOntologySource {
    async fn property(
        &self,
        predicate: &str,
        scope: &str,
    ) -> Result<Option<PropertyDescription>, OntologyError> {
        match tokio::time::timeout(self.timeout, self.inner.property(predicate, scope)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(predicate = %predicate, "property lookup timed out");
                Err(OntologyError::Timeout)
            }
        }
    }

    async fn super_classes(&self, class: &str) -> Result<Option<Vec<String>>, OntologyError> {
        match tokio::time::timeout(self.timeout, self.inner.super_classes(class)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(class = %class, "class lookup timed out");
                Err(OntologyError::Timeout)
            }
        }
    }
}

/// Read the snapshot the ontology-ingestion job writes. A missing file is
/// an empty ontology.
pub fn load_snapshot(path: &Path) -> Result<OntologySnapshot> {
    if !path.exists() {
        warn!(path = %path.display(), "ontology snapshot not found; all lookups will degrade");
        return Ok(OntologySnapshot::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ontology snapshot: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse ontology snapshot: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontodex_core::ontology::MemoryOntology;

    struct Stalled;

    #[async_trait]
    impl OntologySource for Stalled {
        async fn property(
            &self,
            _predicate: &str,
            _scope: &str,
        ) -> Result<Option<PropertyDescription>, OntologyError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn super_classes(&self, _class: &str) -> Result<Option<Vec<String>>, OntologyError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_error() {
        let source = TimeoutOntologySource::new(Arc::new(Stalled), Duration::from_millis(20));
        assert_eq!(
            source.property("http://ex.org/p", ANY_SCOPE).await,
            Err(OntologyError::Timeout)
        );
        assert_eq!(
            source.super_classes("http://ex.org/C").await,
            Err(OntologyError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_timeout_passes_answers_through() {
        let snapshot = OntologySnapshot::default().with_class(
            "http://ex.org/onto/",
            "http://ex.org/B",
            &["http://ex.org/A"],
        );
        let source = TimeoutOntologySource::new(
            Arc::new(MemoryOntology::new(snapshot)),
            Duration::from_secs(5),
        );
        assert_eq!(
            source.super_classes("http://ex.org/B").await,
            Ok(Some(vec!["http://ex.org/A".to_string()]))
        );
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let snapshot = load_snapshot(&dir.path().join("absent.json")).unwrap();
        assert!(snapshot.ontologies.is_empty());
    }

    #[test]
    fn test_snapshot_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ontology.json");
        std::fs::write(
            &path,
            r#"{"ontologies": {"http://ex.org/onto/": {
                "classes": {"http://ex.org/B": {"super_classes": ["http://ex.org/A"]}},
                "properties": {"http://ex.org/weight": {"max_cardinality": 1, "range": ["http://www.w3.org/2001/XMLSchema#float"]}}
            }}}"#,
        )
        .unwrap();
        let snapshot = load_snapshot(&path).unwrap();
        let onto = &snapshot.ontologies["http://ex.org/onto/"];
        assert_eq!(
            onto.properties["http://ex.org/weight"].max_cardinality,
            Some(1)
        );
    }
}
