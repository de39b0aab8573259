//! Target-side maintenance: orphan pruning, planner statistics, retention.

use domain::models::{SyncOperation, SyncStatus};
use persistence::repositories::sync_log::SyncCounts;
use persistence::repositories::{
    DataCacheRepository, DataExportRepository, SyncLogRepository, UserAnalyticsRepository,
};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::{EtlError, Result};

/// Child tables pruned against `affiliates`.
const ORPHAN_TABLES: [&str; 3] = ["referrals", "bet_activities", "deposit_records"];

/// Tables refreshed with ANALYZE after maintenance.
const ANALYZED_TABLES: [&str; 6] = [
    "affiliates",
    "referrals",
    "bet_activities",
    "deposit_records",
    "user_analytics",
    "affiliate_analytics",
];

/// What one maintenance run removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub orphans_deleted: u64,
    pub logs_pruned: u64,
    pub analytics_pruned: u64,
    pub cache_purged: u64,
    pub exports_expired: u64,
    pub tables_analyzed: usize,
}

/// Target database maintenance pass.
#[derive(Clone)]
pub struct CleanupService {
    target: PgPool,
    sync_logs: SyncLogRepository,
    user_analytics: UserAnalyticsRepository,
    cache: DataCacheRepository,
    exports: DataExportRepository,
    log_retention_days: u32,
}

impl CleanupService {
    pub fn new(
        target: PgPool,
        sync_logs: SyncLogRepository,
        user_analytics: UserAnalyticsRepository,
        cache: DataCacheRepository,
        exports: DataExportRepository,
        log_retention_days: u32,
    ) -> Self {
        Self {
            target,
            sync_logs,
            user_analytics,
            cache,
            exports,
            log_retention_days,
        }
    }

    /// Runs the full maintenance pass under a CLEANUP sync log.
    /// `analytics_retention_days` comes from the dynamic analytics settings.
    pub async fn run(&self, analytics_retention_days: u32) -> Result<CleanupReport> {
        let log = self
            .sync_logs
            .start("cleanup", None, SyncOperation::Cleanup)
            .await
            .map_err(EtlError::from)?;

        match self.run_inner(analytics_retention_days).await {
            Ok(report) => {
                let processed = report.orphans_deleted
                    + report.logs_pruned
                    + report.analytics_pruned
                    + report.cache_purged
                    + report.exports_expired;
                let counts = SyncCounts {
                    processed: processed as i64,
                    success: processed as i64,
                    failed: 0,
                };
                let metadata = serde_json::to_value(&report).ok();
                if let Err(err) = self
                    .sync_logs
                    .finalize(log.id, SyncStatus::Completed, counts, None, metadata)
                    .await
                {
                    warn!(error = %err, "failed to finalize cleanup log");
                }
                info!(
                    orphans = report.orphans_deleted,
                    logs = report.logs_pruned,
                    cache = report.cache_purged,
                    exports = report.exports_expired,
                    "cleanup completed"
                );
                Ok(report)
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(log_err) = self
                    .sync_logs
                    .finalize(
                        log.id,
                        SyncStatus::Failed,
                        SyncCounts::default(),
                        Some(&message),
                        None,
                    )
                    .await
                {
                    warn!(error = %log_err, "failed to finalize cleanup log");
                }
                Err(err)
            }
        }
    }

    async fn run_inner(&self, analytics_retention_days: u32) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        // Orphaned child rows whose affiliate no longer exists.
        for table in ORPHAN_TABLES {
            let deleted = self.delete_orphans(table).await?;
            if deleted > 0 {
                info!(table, deleted, "deleted orphaned rows");
            }
            report.orphans_deleted += deleted;
        }

        for table in ANALYZED_TABLES {
            sqlx::query(&format!("ANALYZE {}", table))
                .execute(&self.target)
                .await
                .map_err(EtlError::from)?;
            report.tables_analyzed += 1;
        }

        report.logs_pruned = self
            .sync_logs
            .prune_older_than(self.log_retention_days)
            .await
            .map_err(EtlError::from)?;
        report.analytics_pruned = self
            .user_analytics
            .prune_older_than(analytics_retention_days)
            .await
            .map_err(EtlError::from)?;
        report.cache_purged = self.cache.purge_expired().await.map_err(EtlError::from)?;
        report.exports_expired = self.exports.expire_overdue().await.map_err(EtlError::from)?;

        Ok(report)
    }

    async fn delete_orphans(&self, table: &str) -> Result<u64> {
        let result = sqlx::query(&format!(
            r#"
            DELETE FROM {table} child
            WHERE NOT EXISTS (
                SELECT 1 FROM affiliates a
                WHERE a.external_user_id = child.external_user_id
            )
            "#,
        ))
        .execute(&self.target)
        .await
        .map_err(EtlError::from)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphan_tables_carry_external_user_id() {
        // Every pruned table upserts by a per-table external key but carries
        // the external_user_id foreign column checked here.
        assert_eq!(ORPHAN_TABLES.len(), 3);
        assert!(ANALYZED_TABLES.contains(&"affiliates"));
        for table in ORPHAN_TABLES {
            assert!(ANALYZED_TABLES.contains(&table));
        }
    }

    #[test]
    fn test_report_serializes() {
        let report = CleanupReport {
            orphans_deleted: 3,
            logs_pruned: 10,
            analytics_pruned: 4,
            cache_purged: 2,
            exports_expired: 1,
            tables_analyzed: 6,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["orphans_deleted"], 3);
        assert_eq!(json["tables_analyzed"], 6);
    }
}
