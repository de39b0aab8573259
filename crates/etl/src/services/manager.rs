//! Core manager facade: initialization, manual syncs, status, shutdown.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use domain::models::{SyncMode, SyncOperation, SyncStatus, TableConfig, TableRegistry};
use persistence::db::{self, PoolStats};
use persistence::entities::{AffiliateAnalyticsEntity, UserAnalyticsEntity};
use persistence::repositories::sync_log::SyncCounts;
use persistence::repositories::{
    AffiliateAnalyticsRepository, DataCacheRepository, DataExportRepository,
    SyncConfigurationRepository, SyncLogRepository, UserAnalyticsRepository,
};
use serde::Serialize;
use shared::period::PeriodType;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::jobs::cleanup::CleanupJob;
use crate::jobs::full_sync::FullSyncJob;
use crate::jobs::incremental_sync::IncrementalSyncJob;
use crate::jobs::pool_metrics::PoolMetricsJob;
use crate::jobs::scheduler::{JobKind, JobSchedule, JobScheduler, SchedulerStatsSnapshot};
use crate::services::analytics::AnalyticsEngine;
use crate::services::cleanup::{CleanupReport, CleanupService};
use crate::services::extract::SourceReader;
use crate::services::load::TargetWriter;
use crate::services::syncer::{SyncOptions, SyncOutcome, TableSyncer};
use crate::settings::ConfigProvider;

/// Aggregated result of one multi-table sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub mode: SyncMode,
    pub tables_synced: usize,
    pub tables_failed: usize,
    pub records_processed: u64,
    pub records_loaded: u64,
    pub duration_ms: u64,
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncSummary {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            tables_synced: 0,
            tables_failed: 0,
            records_processed: 0,
            records_loaded: 0,
            duration_ms: 0,
            outcomes: Vec::new(),
        }
    }

    fn add(&mut self, outcome: SyncOutcome) {
        if outcome.success {
            self.tables_synced += 1;
        } else {
            self.tables_failed += 1;
        }
        self.records_processed += outcome.records_extracted;
        self.records_loaded += outcome.records_loaded;
        self.outcomes.push(outcome);
    }
}

/// Cumulative engine counters.
#[derive(Debug, Default)]
pub struct CoreMetrics {
    syncs_completed: AtomicU64,
    syncs_failed: AtomicU64,
    records_processed: AtomicU64,
    records_loaded: AtomicU64,
    analytics_generated: AtomicU64,
    cleanups_completed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CoreMetricsSnapshot {
    pub syncs_completed: u64,
    pub syncs_failed: u64,
    pub records_processed: u64,
    pub records_loaded: u64,
    pub analytics_generated: u64,
    pub cleanups_completed: u64,
}

impl CoreMetrics {
    fn snapshot(&self) -> CoreMetricsSnapshot {
        CoreMetricsSnapshot {
            syncs_completed: self.syncs_completed.load(Ordering::Relaxed),
            syncs_failed: self.syncs_failed.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            records_loaded: self.records_loaded.load(Ordering::Relaxed),
            analytics_generated: self.analytics_generated.load(Ordering::Relaxed),
            cleanups_completed: self.cleanups_completed.load(Ordering::Relaxed),
        }
    }
}

/// Scheduler state for the status report.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub started: bool,
    pub running_jobs: Vec<JobKind>,
    pub fires: Option<SchedulerStatsSnapshot>,
}

/// Full engine status.
#[derive(Debug, Clone, Serialize)]
pub struct CoreStatus {
    pub healthy: bool,
    pub initialized: bool,
    pub source_pool: PoolStats,
    pub target_pool: PoolStats,
    pub scheduler: SchedulerStatus,
    pub metrics: CoreMetricsSnapshot,
}

struct ManagerInner {
    config: Config,
    source_pool: PgPool,
    target_pool: PgPool,
    provider: Arc<dyn ConfigProvider>,
    registry: TableRegistry,
    sync_logs: SyncLogRepository,
    sync_configs: SyncConfigurationRepository,
    syncer: TableSyncer,
    analytics: AnalyticsEngine,
    cleanup: CleanupService,
    scheduler: tokio::sync::Mutex<Option<JobScheduler>>,
    initialized: AtomicBool,
    metrics: CoreMetrics,
}

/// Process-wide facade over the sync engine. Cheap to clone; handlers and
/// jobs receive clones instead of reaching for global state.
#[derive(Clone)]
pub struct CoreManager {
    inner: Arc<ManagerInner>,
}

impl CoreManager {
    /// Builds the manager and both connection pools. A pool that cannot be
    /// created here is fatal to startup.
    pub async fn connect(config: Config, provider: Arc<dyn ConfigProvider>) -> Result<Self> {
        let source_pool = db::create_pool(&config.source_database.pool_config())
            .await
            .map_err(EtlError::from)?;
        let target_pool = db::create_pool(&config.target_database.pool_config())
            .await
            .map_err(EtlError::from)?;
        Ok(Self::from_pools(config, provider, source_pool, target_pool))
    }

    /// Wires the engine onto existing pools.
    pub fn from_pools(
        config: Config,
        provider: Arc<dyn ConfigProvider>,
        source_pool: PgPool,
        target_pool: PgPool,
    ) -> Self {
        let tuning = &config.etl;
        let reader = SourceReader::new(
            source_pool.clone(),
            tuning.max_retries,
            Duration::from_millis(tuning.retry_delay_ms),
            Duration::from_secs(tuning.source_query_timeout_secs),
        );
        let writer = TargetWriter::new(
            target_pool.clone(),
            Duration::from_secs(tuning.target_write_timeout_secs),
        );
        let sync_logs = SyncLogRepository::new(target_pool.clone());
        let sync_configs = SyncConfigurationRepository::new(target_pool.clone());
        let syncer = TableSyncer::new(
            reader.clone(),
            writer,
            sync_logs.clone(),
            sync_configs.clone(),
            tuning.batch_size,
            Duration::from_secs(tuning.full_sync_budget_secs),
            Duration::from_secs(tuning.incremental_sync_budget_secs),
        );
        let analytics = AnalyticsEngine::new(
            reader,
            UserAnalyticsRepository::new(target_pool.clone()),
            AffiliateAnalyticsRepository::new(target_pool.clone()),
            Arc::clone(&provider),
        );
        let cleanup = CleanupService::new(
            target_pool.clone(),
            sync_logs.clone(),
            UserAnalyticsRepository::new(target_pool.clone()),
            DataCacheRepository::new(target_pool.clone()),
            DataExportRepository::new(target_pool.clone()),
            tuning.log_retention_days,
        );

        Self {
            inner: Arc::new(ManagerInner {
                config,
                source_pool,
                target_pool,
                provider,
                registry: TableRegistry::builtin(),
                sync_logs,
                sync_configs,
                syncer,
                analytics,
                cleanup,
                scheduler: tokio::sync::Mutex::new(None),
                initialized: AtomicBool::new(false),
                metrics: CoreMetrics::default(),
            }),
        }
    }

    /// Applies the target schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../persistence/src/migrations")
            .run(&self.inner.target_pool)
            .await
            .map_err(|err| EtlError::Configuration(format!("migration failed: {}", err)))?;
        Ok(())
    }

    /// Verifies both databases and starts the scheduler. Re-entry after a
    /// successful initialization is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.initialized.load(Ordering::SeqCst) {
            info!("core manager already initialized");
            return Ok(());
        }

        db::ping(&self.inner.source_pool)
            .await
            .map_err(EtlError::from)?;
        db::ping(&self.inner.target_pool)
            .await
            .map_err(EtlError::from)?;

        let settings = self.inner.provider.data_sync_settings().await;
        for table in self.inner.registry.enabled() {
            self.inner
                .sync_configs
                .ensure(
                    &table.source_table,
                    settings.sync_interval_minutes as i32,
                    settings.batch_size as i32,
                    settings.max_retry_attempts as i32,
                    self.inner.config.etl.source_query_timeout_secs as i32,
                )
                .await
                .map_err(EtlError::from)?;
        }

        if self.inner.config.scheduler.enabled {
            self.start_scheduler().await?;
        }

        self.inner.initialized.store(true, Ordering::SeqCst);
        info!("core manager initialized");
        Ok(())
    }

    async fn start_scheduler(&self) -> Result<()> {
        let scheduler_config = &self.inner.config.scheduler;
        let timezone: Tz = scheduler_config.timezone.parse().map_err(|_| {
            EtlError::Configuration(format!(
                "unknown timezone '{}'",
                scheduler_config.timezone
            ))
        })?;

        let mut scheduler = JobScheduler::new();
        scheduler.register(FullSyncJob::new(
            self.clone(),
            JobSchedule::parse(&scheduler_config.full_sync_cron, timezone)?,
        ));
        scheduler.register(IncrementalSyncJob::new(
            self.clone(),
            JobSchedule::parse(&scheduler_config.incremental_sync_cron, timezone)?,
        ));
        scheduler.register(CleanupJob::new(
            self.clone(),
            JobSchedule::parse(&scheduler_config.cleanup_cron, timezone)?,
        ));
        scheduler.register(PoolMetricsJob::new(
            self.inner.source_pool.clone(),
            self.inner.target_pool.clone(),
            JobSchedule::parse(&scheduler_config.pool_metrics_cron, timezone)?,
        ));
        scheduler.start();

        *self.inner.scheduler.lock().await = Some(scheduler);
        Ok(())
    }

    /// The tables eligible for sync under the current dynamic settings.
    async fn active_tables(&self) -> TableRegistry {
        let settings = self.inner.provider.data_sync_settings().await;
        let mut registry = self.inner.registry.clone();
        if !settings.sync_tables.is_empty() {
            registry.retain(&settings.sync_tables);
        }
        registry
    }

    /// Single-table sync entry point.
    pub async fn sync_table(
        &self,
        name: &str,
        mode: SyncMode,
        opts: SyncOptions,
    ) -> Result<SyncOutcome> {
        let registry = self.active_tables().await;
        let table = registry
            .get(name)
            .ok_or_else(|| EtlError::Configuration(format!("unknown table '{}'", name)))?;
        if !table.enabled {
            return Err(EtlError::Configuration(format!(
                "table '{}' is disabled",
                name
            )));
        }
        if mode == SyncMode::Incremental && !table.supports_incremental() {
            return Err(EtlError::Configuration(format!(
                "table '{}' declares no incremental field",
                name
            )));
        }
        Ok(self.sync_one(table, mode, opts).await)
    }

    async fn sync_one(
        &self,
        table: &TableConfig,
        mode: SyncMode,
        mut opts: SyncOptions,
    ) -> SyncOutcome {
        if opts.batch_size.is_none() {
            let settings = self.inner.provider.data_sync_settings().await;
            opts.batch_size = Some(settings.batch_size);
        }
        let outcome = self.inner.syncer.sync_table(table, mode, &opts).await;

        let metrics = &self.inner.metrics;
        if outcome.success {
            metrics.syncs_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            metrics.syncs_failed.fetch_add(1, Ordering::Relaxed);
        }
        metrics
            .records_processed
            .fetch_add(outcome.records_extracted, Ordering::Relaxed);
        metrics
            .records_loaded
            .fetch_add(outcome.records_loaded, Ordering::Relaxed);
        outcome
    }

    /// Synchronously syncs every enabled table in full mode.
    pub async fn run_full_sync(&self) -> SyncSummary {
        self.run_sync_pass(SyncMode::Full).await
    }

    /// Synchronously syncs every enabled incremental table.
    pub async fn run_incremental_sync(&self) -> SyncSummary {
        self.run_sync_pass(SyncMode::Incremental).await
    }

    async fn run_sync_pass(&self, mode: SyncMode) -> SyncSummary {
        let started = Instant::now();
        let registry = self.active_tables().await;
        let tables: Vec<TableConfig> = match mode {
            SyncMode::Full => registry.enabled().cloned().collect(),
            SyncMode::Incremental => registry.incremental().cloned().collect(),
        };
        let delay = Duration::from_secs(match mode {
            SyncMode::Full => self.inner.config.scheduler.full_sync_table_delay_secs,
            SyncMode::Incremental => self.inner.config.scheduler.incremental_table_delay_secs,
        });

        info!(mode = %mode, tables = tables.len(), "sync pass starting");
        let mut summary = SyncSummary::new(mode);
        for (index, table) in tables.iter().enumerate() {
            if index > 0 {
                // Inter-table delay keeps pressure off the source database.
                tokio::time::sleep(delay).await;
            }
            let outcome = self.sync_one(table, mode, SyncOptions::default()).await;
            summary.add(outcome);
        }
        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            mode = %mode,
            synced = summary.tables_synced,
            failed = summary.tables_failed,
            records = summary.records_processed,
            "sync pass finished"
        );
        summary
    }

    /// Target-side maintenance pass.
    pub async fn run_cleanup(&self) -> Result<CleanupReport> {
        let analytics_settings = self.inner.provider.analytics_settings().await;
        let report = self
            .inner
            .cleanup
            .run(analytics_settings.retention_days)
            .await?;
        self.inner
            .metrics
            .cleanups_completed
            .fetch_add(1, Ordering::Relaxed);
        Ok(report)
    }

    /// Purges expired cache entries outside the scheduled cleanup.
    /// Idempotent; safe to run concurrently with the cleanup job.
    pub async fn purge_expired_cache(&self) -> Result<u64> {
        DataCacheRepository::new(self.inner.target_pool.clone())
            .purge_expired()
            .await
            .map_err(EtlError::from)
    }

    pub async fn generate_user_analytics(
        &self,
        user_id: i64,
        period_type: PeriodType,
        reference: Option<DateTime<Utc>>,
    ) -> Result<Option<UserAnalyticsEntity>> {
        let entity = self
            .inner
            .analytics
            .generate_user_analytics(user_id, period_type, reference)
            .await?;
        if entity.is_some() {
            self.inner
                .metrics
                .analytics_generated
                .fetch_add(1, Ordering::Relaxed);
        }
        Ok(entity)
    }

    pub async fn generate_affiliate_analytics(
        &self,
        affiliate_id: i64,
        period_type: PeriodType,
        reference: Option<DateTime<Utc>>,
    ) -> Result<Option<AffiliateAnalyticsEntity>> {
        let entity = self
            .inner
            .analytics
            .generate_affiliate_analytics(affiliate_id, period_type, reference)
            .await?;
        if entity.is_some() {
            self.inner
                .metrics
                .analytics_generated
                .fetch_add(1, Ordering::Relaxed);
        }
        Ok(entity)
    }

    /// Post-sync aggregation: refresh daily rollups for users active on the
    /// target within the last day, under an AGGREGATE log.
    pub async fn run_analytics_pass(&self) -> Result<u64> {
        let log = self
            .inner
            .sync_logs
            .start("post_sync", None, SyncOperation::Aggregate)
            .await
            .map_err(EtlError::from)?;

        let user_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT external_user_id
            FROM bet_activities
            WHERE placed_at >= NOW() - INTERVAL '1 day'
            LIMIT 500
            "#,
        )
        .fetch_all(&self.inner.target_pool)
        .await
        .map_err(EtlError::from)?;

        let mut generated: u64 = 0;
        let mut failed: u64 = 0;
        for user_id in &user_ids {
            match self
                .inner
                .analytics
                .generate_user_analytics(*user_id, PeriodType::Daily, None)
                .await
            {
                Ok(Some(_)) => generated += 1,
                Ok(None) => {}
                Err(err) => {
                    failed += 1;
                    warn!(user_id, error = %err, "analytics refresh failed for user");
                }
            }
        }

        let counts = SyncCounts {
            processed: user_ids.len() as i64,
            success: generated as i64,
            failed: failed as i64,
        };
        if let Err(err) = self
            .inner
            .sync_logs
            .finalize(log.id, SyncStatus::Completed, counts, None, None)
            .await
        {
            warn!(error = %err, "failed to finalize analytics pass log");
        }

        self.inner
            .metrics
            .analytics_generated
            .fetch_add(generated, Ordering::Relaxed);
        Ok(generated)
    }

    /// Health, pool and scheduler state plus cumulative counters.
    pub async fn status(&self) -> CoreStatus {
        let source_ok = db::ping(&self.inner.source_pool).await.is_ok();
        let target_ok = db::ping(&self.inner.target_pool).await.is_ok();

        let scheduler_guard = self.inner.scheduler.lock().await;
        let scheduler = match scheduler_guard.as_ref() {
            Some(scheduler) => SchedulerStatus {
                started: true,
                running_jobs: scheduler.running_kinds(),
                fires: Some(scheduler.stats()),
            },
            None => SchedulerStatus {
                started: false,
                running_jobs: Vec::new(),
                fires: None,
            },
        };

        CoreStatus {
            healthy: source_ok && target_ok,
            initialized: self.inner.initialized.load(Ordering::SeqCst),
            source_pool: db::pool_stats(&self.inner.source_pool),
            target_pool: db::pool_stats(&self.inner.target_pool),
            scheduler,
            metrics: self.inner.metrics.snapshot(),
        }
    }

    /// Graceful shutdown: stop scheduling, drain running jobs, close pools.
    pub async fn stop(&self) {
        info!("core manager stopping");
        let scheduler = self.inner.scheduler.lock().await.take();
        if let Some(scheduler) = scheduler {
            scheduler.stop(Duration::from_secs(30)).await;
        }
        self.inner.source_pool.close().await;
        self.inner.target_pool.close().await;
        info!("core manager stopped");
    }
}
