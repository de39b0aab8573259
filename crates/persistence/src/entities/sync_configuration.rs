//! Sync configuration entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for `sync_configurations`.
///
/// One row per syncable table. `last_sync_at` doubles as the persisted
/// incremental watermark.
#[derive(Debug, Clone, FromRow)]
pub struct SyncConfigurationEntity {
    pub id: Uuid,
    pub table_name: String,
    pub sync_interval_minutes: i32,
    pub batch_size: i32,
    pub max_retries: i32,
    pub timeout_seconds: i32,

    /// ACTIVE, INACTIVE or ERROR.
    pub status: String,

    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
