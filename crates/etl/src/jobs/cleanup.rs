//! Scheduled maintenance job.

use super::scheduler::{Job, JobKind, JobSchedule};
use crate::services::manager::CoreManager;
use tracing::info;

/// Weekly target-side maintenance: orphan pruning, ANALYZE, retention.
pub struct CleanupJob {
    manager: CoreManager,
    schedule: JobSchedule,
}

impl CleanupJob {
    pub fn new(manager: CoreManager, schedule: JobSchedule) -> Self {
        Self { manager, schedule }
    }
}

#[async_trait::async_trait]
impl Job for CleanupJob {
    fn kind(&self) -> JobKind {
        JobKind::Cleanup
    }

    fn schedule(&self) -> &JobSchedule {
        &self.schedule
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self
            .manager
            .run_cleanup()
            .await
            .map_err(|e| format!("cleanup failed: {}", e))?;

        info!(
            orphans = report.orphans_deleted,
            logs = report.logs_pruned,
            cache = report.cache_purged,
            exports = report.exports_expired,
            "scheduled cleanup finished"
        );
        Ok(())
    }
}
