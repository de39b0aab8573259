//! Sync configuration repository.
//!
//! Besides the per-table tuning row, `last_sync_at` carries the persisted
//! incremental watermark, so incremental semantics survive process restarts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::SyncConfigurationEntity;

const RETURNING: &str = "id, table_name, sync_interval_minutes, batch_size, max_retries, \
     timeout_seconds, status, last_sync_at, created_at, updated_at";

/// Repository for `sync_configurations`.
#[derive(Clone)]
pub struct SyncConfigurationRepository {
    pool: PgPool,
}

impl SyncConfigurationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a configuration row for a table unless one already exists.
    pub async fn ensure(
        &self,
        table_name: &str,
        sync_interval_minutes: i32,
        batch_size: i32,
        max_retries: i32,
        timeout_seconds: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sync_configurations
                (table_name, sync_interval_minutes, batch_size, max_retries, timeout_seconds)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (table_name) DO NOTHING
            "#,
        )
        .bind(table_name)
        .bind(sync_interval_minutes)
        .bind(batch_size)
        .bind(max_retries)
        .bind(timeout_seconds)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    pub async fn get(
        &self,
        table_name: &str,
    ) -> Result<Option<SyncConfigurationEntity>, sqlx::Error> {
        sqlx::query_as::<_, SyncConfigurationEntity>(&format!(
            r#"
            SELECT {RETURNING}
            FROM sync_configurations
            WHERE table_name = $1
            "#,
        ))
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await
    }

    /// The persisted incremental watermark for a table.
    pub async fn watermark(
        &self,
        table_name: &str,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT last_sync_at FROM sync_configurations WHERE table_name = $1
            "#,
        )
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.flatten())
    }

    /// Advances the persisted watermark after a successful sync.
    pub async fn advance_watermark(
        &self,
        table_name: &str,
        watermark: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sync_configurations (table_name, last_sync_at)
            VALUES ($1, $2)
            ON CONFLICT (table_name) DO UPDATE SET
                last_sync_at = GREATEST(sync_configurations.last_sync_at, EXCLUDED.last_sync_at),
                updated_at = NOW()
            "#,
        )
        .bind(table_name)
        .bind(watermark)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    /// Marks a table's configuration status.
    pub async fn set_status(&self, table_name: &str, status: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE sync_configurations
            SET status = $2, updated_at = NOW()
            WHERE table_name = $1
            "#,
        )
        .bind(table_name)
        .bind(status)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    pub async fn list(&self) -> Result<Vec<SyncConfigurationEntity>, sqlx::Error> {
        sqlx::query_as::<_, SyncConfigurationEntity>(&format!(
            r#"
            SELECT {RETURNING}
            FROM sync_configurations
            ORDER BY table_name
            "#,
        ))
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returning_covers_entity_columns() {
        for column in [
            "table_name",
            "sync_interval_minutes",
            "batch_size",
            "max_retries",
            "timeout_seconds",
            "status",
            "last_sync_at",
        ] {
            assert!(RETURNING.contains(column), "missing {column}");
        }
    }
}
