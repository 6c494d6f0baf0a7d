use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table the SQLite backends use. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Create documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            uid TEXT PRIMARY KEY,
            uri TEXT NOT NULL,
            dataset TEXT NOT NULL,
            indexed_at INTEGER NOT NULL,
            UNIQUE(dataset, uri)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create per-field rows, in projection order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_fields (
            uid TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            multi_valued INTEGER NOT NULL,
            PRIMARY KEY (uid, ordinal),
            FOREIGN KEY (uid) REFERENCES documents(uid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Persisted field schema
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_fields (
            name TEXT PRIMARY KEY,
            first_seen INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Shared metadata cache tier
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            region TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (region, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='documents_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE documents_fts USING fts5(
                uid UNINDEXED,
                dataset UNINDEXED,
                text
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_document_fields_name ON document_fields(name, value)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_uri ON documents(uri)")
        .execute(pool)
        .await?;

    Ok(())
}
