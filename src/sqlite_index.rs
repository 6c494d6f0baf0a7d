//! SQLite-backed [`DocumentIndex`].
//!
//! Documents are stored as one row in `documents`, one row per field value
//! in `document_fields`, and one FTS5 row holding every non-identity value
//! for keyword search. The persisted field schema is the `schema_fields`
//! table. Writes are buffered in memory and flushed in a single
//! transaction on [`commit`](DocumentIndex::commit) unless the index runs
//! in autocommit mode.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use ontodex_core::error::IndexError;
use ontodex_core::fields;
use ontodex_core::index::DocumentIndex;
use ontodex_core::models::IndexDocument;

pub struct SqliteIndex {
    pool: SqlitePool,
    pending: Mutex<Vec<IndexDocument>>,
    autocommit: bool,
}

fn db_err(e: sqlx::Error) -> IndexError {
    IndexError::Unavailable(e.to_string())
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool, autocommit: bool) -> Self {
        Self {
            pool,
            pending: Mutex::new(Vec::new()),
            autocommit,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Documents waiting for the next commit.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    async fn write(&self, documents: &[IndexDocument]) -> Result<(), IndexError> {
        if documents.is_empty() {
            return Ok(());
        }
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for doc in documents {
            sqlx::query("DELETE FROM document_fields WHERE uid = ?")
                .bind(&doc.uid)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            sqlx::query("DELETE FROM documents_fts WHERE uid = ?")
                .bind(&doc.uid)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            sqlx::query(
                r#"
                INSERT INTO documents (uid, uri, dataset, indexed_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(uid) DO UPDATE SET indexed_at = excluded.indexed_at
                "#,
            )
            .bind(&doc.uid)
            .bind(&doc.uri)
            .bind(&doc.dataset)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            for (ordinal, field) in doc.fields.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO document_fields (uid, ordinal, name, value, multi_valued) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&doc.uid)
                .bind(ordinal as i64)
                .bind(&field.name)
                .bind(&field.value)
                .bind(field.multi_valued)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }

            sqlx::query("INSERT INTO documents_fts (uid, dataset, text) VALUES (?, ?, ?)")
                .bind(&doc.uid)
                .bind(&doc.dataset)
                .bind(search_text(doc))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!(documents = documents.len(), "flushed documents to sqlite");
        Ok(())
    }
}

/// Text indexed for keyword search: every value except identity fields.
fn search_text(doc: &IndexDocument) -> String {
    doc.fields
        .iter()
        .filter(|f| ![fields::UID, fields::URI, fields::DATASET].contains(&f.name.as_str()))
        .map(|f| f.value.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl DocumentIndex for SqliteIndex {
    async fn add_document(&self, document: &IndexDocument) -> Result<(), IndexError> {
        if document.uri.is_empty() {
            return Err(IndexError::Rejected("document without uri".into()));
        }
        if self.autocommit {
            return self.write(std::slice::from_ref(document)).await;
        }
        self.pending
            .lock()
            .map_err(|_| IndexError::Unavailable("pending buffer lock poisoned".into()))?
            .push(document.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<(), IndexError> {
        let pending = std::mem::take(
            &mut *self
                .pending
                .lock()
                .map_err(|_| IndexError::Unavailable("pending buffer lock poisoned".into()))?,
        );
        self.write(&pending).await
    }

    async fn list_known_fields(&self) -> Result<BTreeSet<String>, IndexError> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM schema_fields")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(names.into_iter().collect())
    }

    async fn refresh_field_schema(&self) -> Result<(), IndexError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO schema_fields (name, first_seen)
            SELECT DISTINCT name, ? FROM document_fields
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        debug!(added = result.rows_affected(), "refreshed sqlite field schema");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        pool
    }

    fn doc(uri: &str) -> IndexDocument {
        let mut d = IndexDocument::new("http://ex.org/ds/", uri);
        d.push(fields::URI, uri, false);
        d.push("prefLabel_en", "Widget One", false);
        d.push(fields::TYPE, "http://ex.org/Widget", true);
        d
    }

    #[tokio::test]
    async fn test_buffered_until_commit() {
        let index = SqliteIndex::new(memory_pool().await, false);
        index.add_document(&doc("http://ex.org/w1")).await.unwrap();
        assert_eq!(index.pending_len(), 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(index.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);

        index.commit().await.unwrap();
        assert_eq!(index.pending_len(), 0);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(index.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_reindex_replaces_fields() {
        let index = SqliteIndex::new(memory_pool().await, true);
        index.add_document(&doc("http://ex.org/w1")).await.unwrap();
        index.add_document(&doc("http://ex.org/w1")).await.unwrap();

        let fields: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_fields")
            .fetch_one(index.pool())
            .await
            .unwrap();
        assert_eq!(fields, 3);
        let fts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents_fts")
            .fetch_one(index.pool())
            .await
            .unwrap();
        assert_eq!(fts, 1);
    }

    #[tokio::test]
    async fn test_schema_refresh() {
        let index = SqliteIndex::new(memory_pool().await, true);
        assert!(index.list_known_fields().await.unwrap().is_empty());
        index.add_document(&doc("http://ex.org/w1")).await.unwrap();
        index.refresh_field_schema().await.unwrap();
        let known = index.list_known_fields().await.unwrap();
        assert!(known.contains("prefLabel_en"));
        assert!(known.contains(fields::TYPE));
        assert_eq!(known.len(), 3);
    }

    #[test]
    fn test_search_text_skips_identity() {
        let d = doc("http://ex.org/w1");
        assert_eq!(search_text(&d), "Widget One\nhttp://ex.org/Widget");
    }
}
