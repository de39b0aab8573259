//! Sync log entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for `data_sync_logs`.
///
/// One row per sync attempt; created RUNNING and finalized exactly once.
#[derive(Debug, Clone, FromRow)]
pub struct SyncLogEntity {
    /// Unique identifier.
    pub id: Uuid,

    /// Sync flavor, e.g. `full`, `incremental`, `manual`.
    pub sync_type: String,

    /// Source table the attempt covered; absent for cross-table operations.
    pub table_name: Option<String>,

    /// Operation kind: SYNC, EXPORT, IMPORT, CLEANUP or AGGREGATE.
    pub operation: String,

    pub records_processed: i64,
    pub records_success: i64,
    pub records_failed: i64,

    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,

    /// RUNNING, COMPLETED, FAILED or CANCELLED.
    pub status: String,

    pub error_message: Option<String>,

    /// Opaque key/value context for the attempt.
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl SyncLogEntity {
    /// The accounting invariant every finalized row satisfies.
    pub fn accounting_holds(&self) -> bool {
        self.records_success + self.records_failed <= self.records_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SyncLogEntity {
        let now = Utc::now();
        SyncLogEntity {
            id: Uuid::new_v4(),
            sync_type: "incremental".to_string(),
            table_name: Some("users".to_string()),
            operation: "SYNC".to_string(),
            records_processed: 10,
            records_success: 8,
            records_failed: 2,
            start_time: now,
            end_time: Some(now),
            duration_ms: Some(1500),
            status: "COMPLETED".to_string(),
            error_message: None,
            metadata: Some(serde_json::json!({"batches": 1})),
            created_at: now,
        }
    }

    #[test]
    fn test_accounting_invariant() {
        let mut log = sample();
        assert!(log.accounting_holds());
        log.records_success = 9;
        assert!(!log.accounting_holds());
    }
}
