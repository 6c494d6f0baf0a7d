use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub uid: String,
    pub uri: String,
    pub dataset: String,
    pub label: Option<String>,
    pub score: f64,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetCount {
    pub value: String,
    pub count: i64,
}

pub async fn run_search(
    config: &Config,
    query: &str,
    dataset: Option<String>,
    limit: i64,
    facet: Option<String>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let hits = search_documents(&pool, query, dataset.as_deref(), limit).await?;

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {}",
            i + 1,
            hit.score,
            hit.label.as_deref().unwrap_or("(unlabelled)")
        );
        println!("    uri: {}", hit.uri);
        println!("    dataset: {}", hit.dataset);
        println!(
            "    excerpt: \"{}\"",
            hit.snippet.replace('\n', " ").trim()
        );
        println!();
    }

    if let Some(field) = facet {
        println!("--- Facet: {} ---", field);
        for fc in facet_counts(&pool, query, dataset.as_deref(), &field).await? {
            println!("{:>6}  {}", fc.count, fc.value);
        }
    }

    pool.close().await;
    Ok(())
}

/// Keyword search over every indexed value, best match first.
pub async fn search_documents(
    pool: &SqlitePool,
    query: &str,
    dataset: Option<&str>,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    let rows = sqlx::query(
        r#"
        SELECT documents_fts.uid AS uid, d.uri AS uri, d.dataset AS dataset, rank,
               snippet(documents_fts, 2, '>>>', '<<<', '...', 24) AS snippet
        FROM documents_fts
        JOIN documents d ON d.uid = documents_fts.uid
        WHERE documents_fts MATCH ?
          AND (? IS NULL OR documents_fts.dataset = ?)
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(query)
    .bind(dataset)
    .bind(dataset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut hits = Vec::with_capacity(rows.len());
    for row in rows {
        let uid: String = row.get("uid");
        let rank: f64 = row.get("rank");
        let label: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM document_fields
            WHERE uid = ? AND name LIKE 'prefLabel\_%' ESCAPE '\'
            ORDER BY ordinal
            LIMIT 1
            "#,
        )
        .bind(&uid)
        .fetch_optional(pool)
        .await?;
        hits.push(SearchHit {
            uid,
            uri: row.get("uri"),
            dataset: row.get("dataset"),
            label,
            score: -rank, // negate so higher = better
            snippet: row.get("snippet"),
        });
    }
    Ok(hits)
}

/// Value counts of `field` over every document matching `query`.
pub async fn facet_counts(
    pool: &SqlitePool,
    query: &str,
    dataset: Option<&str>,
    field: &str,
) -> Result<Vec<FacetCount>> {
    let rows = sqlx::query(
        r#"
        SELECT value, COUNT(DISTINCT uid) AS n
        FROM document_fields
        WHERE name = ?
          AND uid IN (
            SELECT uid FROM documents_fts
            WHERE documents_fts MATCH ?
              AND (? IS NULL OR dataset = ?)
          )
        GROUP BY value
        ORDER BY n DESC, value ASC
        "#,
    )
    .bind(field)
    .bind(query)
    .bind(dataset)
    .bind(dataset)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| FacetCount {
            value: row.get("value"),
            count: row.get("n"),
        })
        .collect())
}
