//! Reading stored documents and the persisted field schema back out of
//! the SQLite index.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use ontodex_core::models::{document_uid, IndexField};

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub uid: String,
    pub uri: String,
    pub dataset: String,
    pub indexed_at: String, // ISO8601
    pub fields: Vec<IndexField>,
}

/// The stored document for `uri` in `dataset`, fields in projection order.
pub async fn get_document(pool: &SqlitePool, dataset: &str, uri: &str) -> Result<StoredDocument> {
    let uid = document_uid(dataset, uri);

    let doc_row = sqlx::query("SELECT uid, uri, dataset, indexed_at FROM documents WHERE uid = ?")
        .bind(&uid)
        .fetch_optional(pool)
        .await?;

    let Some(doc_row) = doc_row else {
        bail!("document not found: <{}> in dataset <{}>", uri, dataset);
    };

    let field_rows = sqlx::query(
        "SELECT name, value, multi_valued FROM document_fields WHERE uid = ? ORDER BY ordinal ASC",
    )
    .bind(&uid)
    .fetch_all(pool)
    .await?;

    let fields = field_rows
        .iter()
        .map(|row| IndexField {
            name: row.get("name"),
            value: row.get("value"),
            multi_valued: row.get("multi_valued"),
        })
        .collect();

    let indexed_at: i64 = doc_row.get("indexed_at");
    Ok(StoredDocument {
        uid: doc_row.get("uid"),
        uri: doc_row.get("uri"),
        dataset: doc_row.get("dataset"),
        indexed_at: format_ts_iso(indexed_at),
        fields,
    })
}

/// The persisted field schema, sorted by name.
pub async fn list_fields(pool: &SqlitePool) -> Result<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM schema_fields ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(names)
}

/// CLI entry point; prints one field per line.
pub async fn run_get(config: &Config, dataset: &str, uri: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let doc = get_document(&pool, dataset, uri).await;
    pool.close().await;
    let doc = doc?;

    println!("--- Document ---");
    println!("uid:        {}", doc.uid);
    println!("uri:        {}", doc.uri);
    println!("dataset:    {}", doc.dataset);
    println!("indexed_at: {}", doc.indexed_at);
    println!();

    println!("--- Fields ({}) ---", doc.fields.len());
    for field in &doc.fields {
        println!("{} = {}", field.name, field.value);
    }
    Ok(())
}

pub async fn run_fields(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let names = list_fields(&pool).await;
    pool.close().await;
    let names = names?;

    if names.is_empty() {
        println!("No fields.");
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
