//! Shared metadata-cache tier in the SQLite database.
//!
//! Several `odx` processes pointed at the same database see each other's
//! resolved ontology metadata. Database errors are logged and treated as a
//! miss; the in-process tier and the ontology source stay authoritative.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use ontodex_core::cache::{CacheRegion, SharedCache};

pub struct SqliteSharedCache {
    pool: SqlitePool,
}

impl SqliteSharedCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn len(&self, region: CacheRegion) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE region = ?")
            .bind(region.as_str())
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0)
    }
}

#[async_trait]
impl SharedCache for SqliteSharedCache {
    async fn get(&self, region: CacheRegion, key: &str) -> Option<String> {
        match sqlx::query_scalar("SELECT value FROM cache_entries WHERE region = ? AND key = ?")
            .bind(region.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!(region = %region, error = %e, "shared cache read failed");
                None
            }
        }
    }

    async fn put(&self, region: CacheRegion, key: &str, value: &str) {
        let result = sqlx::query(
            r#"
            INSERT INTO cache_entries (region, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(region, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(region.as_str())
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!(region = %region, error = %e, "shared cache write failed");
        }
    }

    async fn clear(&self, region: CacheRegion) {
        let result = sqlx::query("DELETE FROM cache_entries WHERE region = ?")
            .bind(region.as_str())
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!(region = %region, error = %e, "shared cache clear failed");
        }
    }
}
