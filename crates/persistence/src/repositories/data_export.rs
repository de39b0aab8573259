//! Data export repository.
//!
//! Tracks export job rows through their lifecycle. File generation happens
//! elsewhere; this repository only owns state transitions and expiry.

use chrono::{DateTime, Utc};
use domain::models::ExportFormat;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::DataExportEntity;

const RETURNING: &str = "id, export_type, status, format, parameters, file_path, \
     file_size_bytes, progress_percentage, error_message, expires_at, created_at, updated_at";

/// Repository for `data_exports`.
#[derive(Clone)]
pub struct DataExportRepository {
    pool: PgPool,
}

impl DataExportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a PENDING export job.
    pub async fn create(
        &self,
        export_type: &str,
        format: ExportFormat,
        parameters: Option<serde_json::Value>,
        expires_at: DateTime<Utc>,
    ) -> Result<DataExportEntity, sqlx::Error> {
        sqlx::query_as::<_, DataExportEntity>(&format!(
            r#"
            INSERT INTO data_exports (export_type, status, format, parameters, expires_at)
            VALUES ($1, 'PENDING', $2, $3, $4)
            RETURNING {RETURNING}
            "#,
        ))
        .bind(export_type)
        .bind(format.as_str())
        .bind(parameters)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
    }

    /// Moves a job to PROCESSING with an updated progress percentage.
    /// Progress is clamped to [0, 100].
    pub async fn set_progress(
        &self,
        id: Uuid,
        progress_percentage: i32,
    ) -> Result<DataExportEntity, sqlx::Error> {
        sqlx::query_as::<_, DataExportEntity>(&format!(
            r#"
            UPDATE data_exports
            SET status = 'PROCESSING',
                progress_percentage = LEAST(100, GREATEST(0, $2)),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {RETURNING}
            "#,
        ))
        .bind(id)
        .bind(progress_percentage)
        .fetch_one(&self.pool)
        .await
    }

    /// Marks a job COMPLETED with its produced file.
    pub async fn complete(
        &self,
        id: Uuid,
        file_path: &str,
        file_size_bytes: i64,
    ) -> Result<DataExportEntity, sqlx::Error> {
        sqlx::query_as::<_, DataExportEntity>(&format!(
            r#"
            UPDATE data_exports
            SET status = 'COMPLETED',
                progress_percentage = 100,
                file_path = $2,
                file_size_bytes = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {RETURNING}
            "#,
        ))
        .bind(id)
        .bind(file_path)
        .bind(file_size_bytes)
        .fetch_one(&self.pool)
        .await
    }

    /// Marks a job FAILED with an error message.
    pub async fn fail(&self, id: Uuid, error_message: &str) -> Result<DataExportEntity, sqlx::Error> {
        sqlx::query_as::<_, DataExportEntity>(&format!(
            r#"
            UPDATE data_exports
            SET status = 'FAILED',
                error_message = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {RETURNING}
            "#,
        ))
        .bind(id)
        .bind(error_message)
        .fetch_one(&self.pool)
        .await
    }

    /// Expires overdue jobs that are still in an expirable state.
    pub async fn expire_overdue(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE data_exports
            SET status = 'EXPIRED', updated_at = NOW()
            WHERE expires_at <= NOW()
              AND status IN ('PENDING', 'PROCESSING', 'COMPLETED')
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<DataExportEntity>, sqlx::Error> {
        sqlx::query_as::<_, DataExportEntity>(&format!(
            r#"
            SELECT {RETURNING}
            FROM data_exports
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returning_covers_entity_columns() {
        for column in [
            "export_type",
            "status",
            "format",
            "progress_percentage",
            "expires_at",
        ] {
            assert!(RETURNING.contains(column), "missing {column}");
        }
    }
}
