//! Scheduled full synchronization job.

use super::scheduler::{Job, JobKind, JobSchedule};
use crate::services::manager::CoreManager;
use tracing::{info, warn};

/// Nightly full sync over every enabled table, followed by the maintenance
/// pass and an analytics refresh.
pub struct FullSyncJob {
    manager: CoreManager,
    schedule: JobSchedule,
}

impl FullSyncJob {
    pub fn new(manager: CoreManager, schedule: JobSchedule) -> Self {
        Self { manager, schedule }
    }
}

#[async_trait::async_trait]
impl Job for FullSyncJob {
    fn kind(&self) -> JobKind {
        JobKind::FullSync
    }

    fn schedule(&self) -> &JobSchedule {
        &self.schedule
    }

    async fn execute(&self) -> Result<(), String> {
        let summary = self.manager.run_full_sync().await;
        info!(
            synced = summary.tables_synced,
            failed = summary.tables_failed,
            records = summary.records_processed,
            "scheduled full sync finished"
        );

        if let Err(err) = self.manager.run_cleanup().await {
            warn!(error = %err, "post-sync cleanup failed");
        }
        if let Err(err) = self.manager.run_analytics_pass().await {
            warn!(error = %err, "post-sync analytics pass failed");
        }

        if summary.tables_failed > 0 {
            return Err(format!("{} tables failed to sync", summary.tables_failed));
        }
        Ok(())
    }
}
