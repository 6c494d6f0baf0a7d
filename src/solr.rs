//! Solr-backed [`DocumentIndex`].
//!
//! Documents go to the JSON update handler, multi-valued fields as arrays.
//! The known-field set is the Luke handler's field list, persisted to a
//! JSON file so every writer reads the same schema without asking Solr.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Map, Value};
use tracing::{debug, info};

use ontodex_core::error::IndexError;
use ontodex_core::index::DocumentIndex;
use ontodex_core::models::IndexDocument;

use crate::config::SolrConfig;

pub struct SolrIndex {
    client: Client,
    core_url: String,
    fields_index_path: PathBuf,
    autocommit: bool,
}

impl SolrIndex {
    pub fn from_config(config: &SolrConfig, autocommit: bool) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            core_url: format!("{}/{}", config.url.trim_end_matches('/'), config.core),
            fields_index_path: config.fields_index_path.clone(),
            autocommit,
        })
    }

    async fn check(response: Result<Response, reqwest::Error>) -> Result<Response, IndexError> {
        let response = response.map_err(|e| IndexError::Unavailable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(IndexError::Rejected(format!("{}: {}", status, body)))
        } else {
            Err(IndexError::Unavailable(format!("{}: {}", status, body)))
        }
    }
}

/// The Solr JSON shape of a document. Single-valued fields are scalars,
/// multi-valued ones arrays in projection order.
pub fn solr_document(doc: &IndexDocument) -> Value {
    let mut grouped: BTreeMap<&str, (bool, Vec<&str>)> = BTreeMap::new();
    for field in &doc.fields {
        let entry = grouped.entry(field.name.as_str()).or_insert((false, Vec::new()));
        entry.0 |= field.multi_valued;
        entry.1.push(field.value.as_str());
    }
    let mut out = Map::new();
    for (name, (multi, values)) in grouped {
        let value = if multi || values.len() > 1 {
            Value::from(values)
        } else {
            Value::from(values[0])
        };
        out.insert(name.to_string(), value);
    }
    Value::Object(out)
}

#[async_trait]
impl DocumentIndex for SolrIndex {
    async fn add_document(&self, document: &IndexDocument) -> Result<(), IndexError> {
        let url = format!("{}/update", self.core_url);
        let mut request = self.client.post(&url).json(&vec![solr_document(document)]);
        if self.autocommit {
            request = request.query(&[("commit", "true")]);
        }
        Self::check(request.send().await).await?;
        debug!(uri = %document.uri, "sent document to solr");
        Ok(())
    }

    async fn commit(&self) -> Result<(), IndexError> {
        let url = format!("{}/update", self.core_url);
        let request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "commit": {} }));
        Self::check(request.send().await).await?;
        Ok(())
    }

    async fn list_known_fields(&self) -> Result<BTreeSet<String>, IndexError> {
        match tokio::fs::read_to_string(&self.fields_index_path).await {
            Ok(raw) => serde_json::from_str::<BTreeSet<String>>(&raw).map_err(|e| {
                IndexError::Unavailable(format!(
                    "unreadable fields index {}: {}",
                    self.fields_index_path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(IndexError::Unavailable(e.to_string())),
        }
    }

    async fn refresh_field_schema(&self) -> Result<(), IndexError> {
        let url = format!("{}/admin/luke", self.core_url);
        let request = self
            .client
            .get(&url)
            .query(&[("wt", "json"), ("numTerms", "0")]);
        let response = Self::check(request.send().await).await?;
        let json: Value = response
            .json()
            .await
            .map_err(|e| IndexError::Unavailable(format!("bad luke response: {}", e)))?;
        let names: BTreeSet<String> = json
            .get("fields")
            .and_then(Value::as_object)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();

        if let Some(parent) = self.fields_index_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| IndexError::Unavailable(e.to_string()))?;
            }
        }
        let raw = serde_json::to_string_pretty(&names)
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        tokio::fs::write(&self.fields_index_path, raw)
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        info!(fields = names.len(), "refreshed solr fields index");
        Ok(())
    }
}
