//! Data export entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for `data_exports`.
#[derive(Debug, Clone, FromRow)]
pub struct DataExportEntity {
    pub id: Uuid,

    /// What is being exported, e.g. `user_analytics`.
    pub export_type: String,

    /// PENDING, PROCESSING, COMPLETED, FAILED or EXPIRED.
    pub status: String,

    /// CSV, JSON, XLSX or PDF.
    pub format: String,

    /// Caller-supplied export parameters.
    pub parameters: Option<serde_json::Value>,

    pub file_path: Option<String>,
    pub file_size_bytes: Option<i64>,

    /// Completion percentage in [0, 100].
    pub progress_percentage: i32,

    pub error_message: Option<String>,

    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
