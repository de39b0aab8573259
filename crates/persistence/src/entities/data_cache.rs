//! Data cache entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for `data_cache`.
#[derive(Debug, Clone, FromRow)]
pub struct DataCacheEntity {
    pub id: Uuid,
    pub cache_key: String,
    pub cache_data: serde_json::Value,
    pub ttl_seconds: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
