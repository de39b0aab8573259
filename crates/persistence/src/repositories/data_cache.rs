//! Data cache repository.

use sqlx::PgPool;

/// Repository for `data_cache`.
#[derive(Clone)]
pub struct DataCacheRepository {
    pool: PgPool,
}

impl DataCacheRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetches a cached value; expired entries read as absent.
    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, sqlx::Error> {
        sqlx::query_scalar::<_, serde_json::Value>(
            r#"
            SELECT cache_data
            FROM data_cache
            WHERE cache_key = $1 AND expires_at > NOW()
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }

    /// Stores a value under a key with a fresh TTL, replacing any previous
    /// entry.
    pub async fn put(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl_seconds: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO data_cache (cache_key, cache_data, ttl_seconds, expires_at)
            VALUES ($1, $2, $3, NOW() + ($3 || ' seconds')::INTERVAL)
            ON CONFLICT (cache_key) DO UPDATE SET
                cache_data = EXCLUDED.cache_data,
                ttl_seconds = EXCLUDED.ttl_seconds,
                expires_at = NOW() + (EXCLUDED.ttl_seconds || ' seconds')::INTERVAL
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(ttl_seconds)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    /// Deletes expired entries. Idempotent; the cleanup job and manual
    /// maintenance paths may both call it.
    pub async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM data_cache WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
