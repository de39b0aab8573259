//! Sync log repository.

use chrono::{DateTime, Utc};
use domain::models::{SyncOperation, SyncStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::SyncLogEntity;

const RETURNING: &str = "id, sync_type, table_name, operation, records_processed, \
     records_success, records_failed, start_time, end_time, duration_ms, status, \
     error_message, metadata, created_at";

/// Row counters reported when a sync attempt finalizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncCounts {
    pub processed: i64,
    pub success: i64,
    pub failed: i64,
}

/// Repository for `data_sync_logs`.
///
/// Log writes go through short-lived pool acquisitions and never share the
/// batch transaction.
#[derive(Clone)]
pub struct SyncLogRepository {
    pool: PgPool,
}

impl SyncLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a RUNNING log row for a new attempt.
    pub async fn start(
        &self,
        sync_type: &str,
        table_name: Option<&str>,
        operation: SyncOperation,
    ) -> Result<SyncLogEntity, sqlx::Error> {
        sqlx::query_as::<_, SyncLogEntity>(&format!(
            r#"
            INSERT INTO data_sync_logs (sync_type, table_name, operation, status, start_time)
            VALUES ($1, $2, $3, 'RUNNING', NOW())
            RETURNING {RETURNING}
            "#,
        ))
        .bind(sync_type)
        .bind(table_name)
        .bind(operation.as_str())
        .fetch_one(&self.pool)
        .await
    }

    /// Finalizes a log row. `duration_ms` is derived from the row's own
    /// `start_time`, so it always matches `end_time - start_time`.
    pub async fn finalize(
        &self,
        id: Uuid,
        status: SyncStatus,
        counts: SyncCounts,
        error_message: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<SyncLogEntity, sqlx::Error> {
        sqlx::query_as::<_, SyncLogEntity>(&format!(
            r#"
            UPDATE data_sync_logs
            SET status = $2,
                records_processed = $3,
                records_success = $4,
                records_failed = $5,
                error_message = $6,
                metadata = COALESCE($7, metadata),
                end_time = NOW(),
                duration_ms = (EXTRACT(EPOCH FROM (NOW() - start_time)) * 1000)::bigint
            WHERE id = $1
            RETURNING {RETURNING}
            "#,
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(counts.processed)
        .bind(counts.success)
        .bind(counts.failed)
        .bind(error_message)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
    }

    /// Latest completion time of a successful SYNC for a table.
    pub async fn last_successful_sync(
        &self,
        table_name: &str,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT MAX(end_time)
            FROM data_sync_logs
            WHERE table_name = $1
              AND operation = 'SYNC'
              AND status = 'COMPLETED'
            "#,
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await
    }

    /// Deletes finalized log rows older than the retention window.
    pub async fn prune_older_than(&self, retention_days: u32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM data_sync_logs
            WHERE start_time < NOW() - ($1 || ' days')::INTERVAL
              AND status <> 'RUNNING'
            "#,
        )
        .bind(retention_days as i32)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Most recent log rows, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<SyncLogEntity>, sqlx::Error> {
        sqlx::query_as::<_, SyncLogEntity>(&format!(
            r#"
            SELECT {RETURNING}
            FROM data_sync_logs
            ORDER BY start_time DESC
            LIMIT $1
            "#,
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
