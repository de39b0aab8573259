//! Background job to record connection pool metrics.

use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobKind, JobSchedule};
use persistence::db::pool_stats;

/// Job that periodically records pool counters for both databases.
pub struct PoolMetricsJob {
    source_pool: PgPool,
    target_pool: PgPool,
    schedule: JobSchedule,
}

impl PoolMetricsJob {
    pub fn new(source_pool: PgPool, target_pool: PgPool, schedule: JobSchedule) -> Self {
        Self {
            source_pool,
            target_pool,
            schedule,
        }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn kind(&self) -> JobKind {
        JobKind::PoolMetrics
    }

    fn schedule(&self) -> &JobSchedule {
        &self.schedule
    }

    async fn execute(&self) -> Result<(), String> {
        let source = pool_stats(&self.source_pool);
        let target = pool_stats(&self.target_pool);
        info!(
            source_size = source.size,
            source_idle = source.idle,
            target_size = target.size,
            target_idle = target.idle,
            "connection pool metrics"
        );
        Ok(())
    }
}
