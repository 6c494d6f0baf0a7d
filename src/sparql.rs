//! SPARQL 1.1 [`GraphStore`] over HTTP.
//!
//! Bulk loads go through the Graph Store HTTP Protocol (`POST` of an
//! N-Triples body to `?graph=<iri>`); incremental loads are `INSERT DATA`
//! updates. Queries use the SPARQL protocol with JSON results.
//!
//! Requests are retried on 429, 5xx and network errors with exponential
//! backoff. Other client errors are returned at once as
//! [`StoreError::Rejected`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use ontodex_core::error::StoreError;
use ontodex_core::models::{Literal, Object, Triple};
use ontodex_core::store::{is_safe_iri, Bindings, GraphStore, LoadStrategy, QueryResults};

use crate::config::GraphStoreConfig;

pub struct SparqlGraphStore {
    client: Client,
    query_url: String,
    update_url: Option<String>,
    graph_store_url: Option<String>,
    strategy: LoadStrategy,
    max_retries: u32,
    backoff_base: Duration,
}

impl SparqlGraphStore {
    pub fn from_config(config: &GraphStoreConfig) -> Result<Self, StoreError> {
        let query_url = config
            .query_url
            .clone()
            .ok_or_else(|| StoreError::Unsupported("graph_store.query_url not set".into()))?;
        let strategy = match config.strategy.as_str() {
            "bulk" => LoadStrategy::Bulk,
            _ => LoadStrategy::Incremental {
                chunk_size: config.chunk_size,
            },
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            query_url,
            update_url: config.update_url.clone(),
            graph_store_url: config.graph_store_url.clone(),
            strategy,
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// First retry delay; doubles per attempt.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<String, StoreError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: base, 2x base, 4x base, ...
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();

                    if status.is_success() {
                        return Ok(body);
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(status = %status, attempt, "graph store request failed, retrying");
                        last_err = Some(StoreError::Unavailable(format!("{}: {}", status, body)));
                        continue;
                    }

                    // Client error (not 429), no retry
                    return Err(StoreError::Rejected(format!("{}: {}", status, body)));
                }
                Err(e) => {
                    warn!(error = %e, attempt, "graph store unreachable, retrying");
                    last_err = Some(StoreError::Unavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| StoreError::Unavailable("request failed after retries".into())))
    }
}

fn ntriples(triples: &[Triple]) -> String {
    let mut out = String::new();
    for t in triples {
        out.push_str(&t.to_ntriples());
        out.push('\n');
    }
    out
}

/// `INSERT DATA` update adding `triples` to `graph`.
pub fn insert_data(graph: &str, triples: &[Triple]) -> String {
    format!("INSERT DATA {{ GRAPH <{}> {{\n{}}} }}", graph, ntriples(triples))
}

#[async_trait]
impl GraphStore for SparqlGraphStore {
    async fn load_triples(&self, graph: &str, triples: &[Triple]) -> Result<(), StoreError> {
        if !is_safe_iri(graph) {
            return Err(StoreError::Rejected(format!("invalid graph IRI <{}>", graph)));
        }
        if triples.is_empty() {
            return Ok(());
        }
        match self.strategy {
            LoadStrategy::Bulk => {
                let url = self.graph_store_url.as_deref().ok_or_else(|| {
                    StoreError::Unsupported("bulk load needs graph_store.graph_store_url".into())
                })?;
                let body = ntriples(triples);
                self.send(|| {
                    self.client
                        .post(url)
                        .query(&[("graph", graph)])
                        .header("Content-Type", "application/n-triples")
                        .body(body.clone())
                })
                .await?;
            }
            LoadStrategy::Incremental { .. } => {
                let url = self.update_url.as_deref().ok_or_else(|| {
                    StoreError::Unsupported("incremental load needs graph_store.update_url".into())
                })?;
                let update = insert_data(graph, triples);
                self.send(|| {
                    self.client
                        .post(url)
                        .header("Content-Type", "application/sparql-update")
                        .body(update.clone())
                })
                .await?;
            }
        }
        debug!(graph = %graph, triples = triples.len(), "sparql load done");
        Ok(())
    }

    async fn query(&self, sparql: &str) -> Result<QueryResults, StoreError> {
        let body = self
            .send(|| {
                self.client
                    .post(&self.query_url)
                    .header("Content-Type", "application/sparql-query")
                    .header("Accept", "application/sparql-results+json")
                    .body(sparql.to_string())
            })
            .await?;
        let json: Value =
            serde_json::from_str(&body).map_err(|e| StoreError::Malformed(e.to_string()))?;
        parse_results(&json)
    }

    fn load_strategy(&self) -> LoadStrategy {
        self.strategy
    }
}

/// Parse a SPARQL 1.1 JSON results document.
pub fn parse_results(json: &Value) -> Result<QueryResults, StoreError> {
    if let Some(b) = json.get("boolean").and_then(Value::as_bool) {
        return Ok(QueryResults::Boolean(b));
    }
    let bindings = json
        .get("results")
        .and_then(|r| r.get("bindings"))
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Malformed("missing results.bindings".into()))?;

    let mut rows = Vec::with_capacity(bindings.len());
    for row in bindings {
        let obj = row
            .as_object()
            .ok_or_else(|| StoreError::Malformed("binding row is not an object".into()))?;
        let mut out = Bindings::new();
        for (var, term) in obj {
            out.insert(var.clone(), parse_term(term)?);
        }
        rows.push(out);
    }
    Ok(QueryResults::Solutions(rows))
}

fn parse_term(term: &Value) -> Result<Object, StoreError> {
    let kind = term.get("type").and_then(Value::as_str).unwrap_or_default();
    let value = term
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed("term without value".into()))?;
    match kind {
        "uri" => Ok(Object::Iri(value.to_string())),
        "bnode" => Ok(Object::Blank(format!("_:{}", value))),
        "literal" | "typed-literal" => {
            let lit = if let Some(lang) = term.get("xml:lang").and_then(Value::as_str) {
                Literal::lang(value, lang)
            } else if let Some(dt) = term.get("datatype").and_then(Value::as_str) {
                Literal::typed(value, dt)
            } else {
                Literal::simple(value)
            };
            Ok(Object::Literal(lit))
        }
        other => Err(StoreError::Malformed(format!("unknown term type '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ask() {
        assert_eq!(
            parse_results(&json!({"head": {}, "boolean": true})).unwrap(),
            QueryResults::Boolean(true)
        );
    }

    #[test]
    fn test_parse_select() {
        let results = parse_results(&json!({
            "head": {"vars": ["p", "label"]},
            "results": {"bindings": [
                {"p": {"type": "uri", "value": "http://www.w3.org/2000/01/rdf-schema#label"},
                 "label": {"type": "literal", "value": "Widget", "xml:lang": "en"}},
                {"p": {"type": "uri", "value": "http://ex.org/n"},
                 "label": {"type": "literal", "value": "3", "datatype": "http://www.w3.org/2001/XMLSchema#int"}}
            ]}
        }))
        .unwrap();
        let QueryResults::Solutions(rows) = results else {
            panic!("expected solutions");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0]["label"],
            Object::Literal(Literal::lang("Widget", "en"))
        );
        assert_eq!(
            rows[1]["label"].as_literal().and_then(|l| l.datatype.as_deref()),
            Some("http://www.w3.org/2001/XMLSchema#int")
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_results(&json!({"head": {}})),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_insert_data() {
        let t = Triple::new("http://ex.org/a", "http://ex.org/p", Object::iri("http://ex.org/b"));
        assert_eq!(
            insert_data("http://ex.org/ds/", &[t]),
            "INSERT DATA { GRAPH <http://ex.org/ds/> {\n<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .\n} }"
        );
    }
}
