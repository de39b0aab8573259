//! Scheduled incremental synchronization job.

use super::scheduler::{Job, JobKind, JobSchedule};
use crate::services::manager::CoreManager;
use tracing::info;

/// Frequent incremental sync over every enabled table that declares an
/// incremental field.
pub struct IncrementalSyncJob {
    manager: CoreManager,
    schedule: JobSchedule,
}

impl IncrementalSyncJob {
    pub fn new(manager: CoreManager, schedule: JobSchedule) -> Self {
        Self { manager, schedule }
    }
}

#[async_trait::async_trait]
impl Job for IncrementalSyncJob {
    fn kind(&self) -> JobKind {
        JobKind::IncrementalSync
    }

    fn schedule(&self) -> &JobSchedule {
        &self.schedule
    }

    async fn execute(&self) -> Result<(), String> {
        let summary = self.manager.run_incremental_sync().await;
        if summary.records_processed > 0 {
            info!(
                synced = summary.tables_synced,
                failed = summary.tables_failed,
                records = summary.records_processed,
                "scheduled incremental sync finished"
            );
        }

        if summary.tables_failed > 0 {
            return Err(format!("{} tables failed to sync", summary.tables_failed));
        }
        Ok(())
    }
}
