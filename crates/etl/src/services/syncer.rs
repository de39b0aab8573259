//! Per-table sync orchestration: extract, map, load, account.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use domain::models::{SyncMode, SyncOperation, SyncStatus, TableConfig};
use persistence::repositories::sync_log::SyncCounts;
use persistence::repositories::{SyncConfigurationRepository, SyncLogRepository};
use serde::Serialize;
use shared::value::Row;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EtlError, Result};
use crate::services::extract::{ReadOptions, SourceReader};
use crate::services::load::TargetWriter;
use crate::services::transform::RecordMapper;

/// Caller-supplied options for one table sync.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub batch_size: Option<i64>,
    pub watermark: Option<DateTime<Utc>>,
}

/// Result of one table sync attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub table: String,
    pub sync_type: SyncMode,
    pub records_extracted: u64,
    pub records_transformed: u64,
    pub records_rejected: u64,
    pub records_loaded: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub batches: u64,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub sync_log_id: Option<Uuid>,
}

/// Running totals across the batches of one sync.
#[derive(Debug, Clone, Default)]
struct Aggregate {
    extracted: u64,
    transformed: u64,
    rejected: u64,
    loaded: u64,
    inserted: u64,
    updated: u64,
    skipped: u64,
    batches: u64,
    failed_rows: u64,
    errors: Vec<String>,
}

/// Orchestrates extract → map → load for one table.
#[derive(Clone)]
pub struct TableSyncer {
    reader: SourceReader,
    writer: TargetWriter,
    sync_logs: SyncLogRepository,
    sync_configs: SyncConfigurationRepository,
    default_batch_size: i64,
    full_budget: Duration,
    incremental_budget: Duration,
}

impl TableSyncer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: SourceReader,
        writer: TargetWriter,
        sync_logs: SyncLogRepository,
        sync_configs: SyncConfigurationRepository,
        default_batch_size: i64,
        full_budget: Duration,
        incremental_budget: Duration,
    ) -> Self {
        Self {
            reader,
            writer,
            sync_logs,
            sync_configs,
            default_batch_size,
            full_budget,
            incremental_budget,
        }
    }

    /// Runs one table sync in the given mode. Stage failures are reported in
    /// the outcome, not raised; the scheduler moves on to the next table.
    pub async fn sync_table(
        &self,
        table: &TableConfig,
        mode: SyncMode,
        opts: &SyncOptions,
    ) -> SyncOutcome {
        let started = Instant::now();

        let log = match self
            .sync_logs
            .start(mode.as_str(), Some(&table.source_table), SyncOperation::Sync)
            .await
        {
            Ok(log) => log,
            Err(err) => {
                return self.failed_outcome(
                    table,
                    mode,
                    None,
                    &Aggregate::default(),
                    format!("failed to open sync log: {}", err),
                    started,
                );
            }
        };

        let budget = match mode {
            SyncMode::Full => self.full_budget,
            SyncMode::Incremental => self.incremental_budget,
        };
        let batch_size = opts.batch_size.unwrap_or(self.default_batch_size);
        let agg = Arc::new(Mutex::new(Aggregate::default()));

        let run = async {
            match mode {
                SyncMode::Full => self.run_full(table, batch_size, &agg).await,
                SyncMode::Incremental => {
                    self.run_incremental(table, batch_size, opts.watermark, &agg).await
                }
            }
        };

        let result = tokio::time::timeout(budget, run).await;
        let snapshot = agg.lock().await.clone();
        let counts = SyncCounts {
            processed: snapshot.extracted as i64,
            success: (snapshot.loaded + snapshot.skipped) as i64,
            failed: (snapshot.rejected + snapshot.failed_rows) as i64,
        };

        match result {
            Ok(Ok(())) => {
                let metadata = serde_json::json!({
                    "batches": snapshot.batches,
                    "inserted": snapshot.inserted,
                    "updated": snapshot.updated,
                    "skipped": snapshot.skipped,
                    "batch_errors": snapshot.errors,
                });
                if let Err(err) = self
                    .sync_logs
                    .finalize(log.id, SyncStatus::Completed, counts, None, Some(metadata))
                    .await
                {
                    warn!(error = %err, "failed to finalize sync log");
                }
                if snapshot.extracted > 0 {
                    // Conservative watermark: wall-clock now, recorded only
                    // when the source row set was non-empty.
                    if let Err(err) = self
                        .sync_configs
                        .advance_watermark(&table.source_table, Utc::now())
                        .await
                    {
                        warn!(error = %err, "failed to advance watermark");
                    }
                }
                if let Err(err) = self
                    .sync_configs
                    .set_status(&table.source_table, "ACTIVE")
                    .await
                {
                    warn!(error = %err, "failed to update sync configuration status");
                }

                info!(
                    table = %table.source_table,
                    mode = %mode,
                    extracted = snapshot.extracted,
                    loaded = snapshot.loaded,
                    rejected = snapshot.rejected,
                    skipped = snapshot.skipped,
                    "table sync completed"
                );

                SyncOutcome {
                    success: true,
                    table: table.source_table.clone(),
                    sync_type: mode,
                    records_extracted: snapshot.extracted,
                    records_transformed: snapshot.transformed,
                    records_rejected: snapshot.rejected,
                    records_loaded: snapshot.loaded,
                    inserted: snapshot.inserted,
                    updated: snapshot.updated,
                    skipped: snapshot.skipped,
                    batches: snapshot.batches,
                    error: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                    sync_log_id: Some(log.id),
                }
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                self.finalize_failed(table, log.id, counts, &message).await;
                self.failed_outcome(table, mode, Some(log.id), &snapshot, message, started)
            }
            Err(_) => {
                let message = format!("sync budget exceeded after {:?}", budget);
                self.finalize_failed(table, log.id, counts, &message).await;
                self.failed_outcome(table, mode, Some(log.id), &snapshot, message, started)
            }
        }
    }

    async fn run_incremental(
        &self,
        table: &TableConfig,
        batch_size: i64,
        caller_watermark: Option<DateTime<Utc>>,
        agg: &Arc<Mutex<Aggregate>>,
    ) -> Result<()> {
        if !table.supports_incremental() {
            return Err(EtlError::Configuration(format!(
                "table '{}' declares no incremental field",
                table.source_table
            )));
        }

        let watermark = self.resolve_watermark(table, caller_watermark).await;
        let opts = ReadOptions {
            batch_size,
            watermark: Some(watermark),
            ..Default::default()
        };

        let batch = self.reader.read_batch(table, &opts).await?;
        if batch.rows.is_empty() {
            return Ok(());
        }
        self.process_batch(table, batch.rows, agg).await
    }

    async fn run_full(
        &self,
        table: &TableConfig,
        batch_size: i64,
        agg: &Arc<Mutex<Aggregate>>,
    ) -> Result<()> {
        let opts = ReadOptions {
            batch_size,
            ..Default::default()
        };
        self.reader
            .read_all(table, &opts, |rows| {
                let agg = agg.clone();
                async move { self.process_batch(table, rows, &agg).await }
            })
            .await?;
        Ok(())
    }

    /// Maps and loads one batch. Batch-scoped failures are recorded and
    /// swallowed so the sync continues; anything else propagates.
    async fn process_batch(
        &self,
        table: &TableConfig,
        rows: Vec<Row>,
        agg: &Arc<Mutex<Aggregate>>,
    ) -> Result<()> {
        let outcome = RecordMapper::map_batch(table, rows);
        for warning in &outcome.warnings {
            warn!(table = %table.source_table, "{}", warning);
        }
        info!(
            table = %table.source_table,
            processed = outcome.stats.processed,
            transformed = outcome.stats.transformed,
            rejected = outcome.stats.rejected,
            success_rate = outcome.stats.success_rate(),
            "batch mapped"
        );

        let record_count = outcome.records.len() as u64;
        let write_result = if outcome.records.is_empty() {
            Ok(Default::default())
        } else {
            self.writer.load_batch(table, &outcome.records).await
        };

        let mut agg = agg.lock().await;
        agg.extracted += outcome.stats.processed;
        agg.transformed += outcome.stats.transformed;
        agg.rejected += outcome.stats.rejected;
        agg.batches += 1;

        match write_result {
            Ok(stats) => {
                agg.loaded += stats.loaded;
                agg.inserted += stats.inserted;
                agg.updated += stats.updated;
                agg.skipped += stats.skipped;
                Ok(())
            }
            Err(err) if err.is_batch_scoped() => {
                warn!(
                    table = %table.source_table,
                    error = %err,
                    "batch load failed; continuing with next batch"
                );
                agg.failed_rows += record_count;
                agg.errors.push(err.to_string());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn resolve_watermark(
        &self,
        table: &TableConfig,
        caller: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        if let Some(watermark) = caller {
            return watermark;
        }
        match self.sync_configs.watermark(&table.source_table).await {
            Ok(Some(watermark)) => watermark,
            Ok(None) => Utc::now() - chrono::Duration::hours(1),
            Err(err) => {
                warn!(
                    table = %table.source_table,
                    error = %err,
                    "failed to read persisted watermark; defaulting to one hour ago"
                );
                Utc::now() - chrono::Duration::hours(1)
            }
        }
    }

    async fn finalize_failed(
        &self,
        table: &TableConfig,
        log_id: Uuid,
        counts: SyncCounts,
        message: &str,
    ) {
        if let Err(err) = self
            .sync_logs
            .finalize(log_id, SyncStatus::Failed, counts, Some(message), None)
            .await
        {
            warn!(error = %err, "failed to finalize sync log");
        }
        if let Err(err) = self
            .sync_configs
            .set_status(&table.source_table, "ERROR")
            .await
        {
            warn!(error = %err, "failed to update sync configuration status");
        }
    }

    fn failed_outcome(
        &self,
        table: &TableConfig,
        mode: SyncMode,
        sync_log_id: Option<Uuid>,
        snapshot: &Aggregate,
        error: String,
        started: Instant,
    ) -> SyncOutcome {
        warn!(table = %table.source_table, mode = %mode, error = %error, "table sync failed");
        SyncOutcome {
            success: false,
            table: table.source_table.clone(),
            sync_type: mode,
            records_extracted: snapshot.extracted,
            records_transformed: snapshot.transformed,
            records_rejected: snapshot.rejected,
            records_loaded: snapshot.loaded,
            inserted: snapshot.inserted,
            updated: snapshot.updated,
            skipped: snapshot.skipped,
            batches: snapshot.batches,
            error: Some(error),
            duration_ms: started.elapsed().as_millis() as u64,
            sync_log_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_options_default() {
        let opts = SyncOptions::default();
        assert!(opts.batch_size.is_none());
        assert!(opts.watermark.is_none());
    }

    #[test]
    fn test_aggregate_accounting_feeds_counts() {
        let agg = Aggregate {
            extracted: 10,
            transformed: 8,
            rejected: 2,
            loaded: 7,
            inserted: 5,
            updated: 2,
            skipped: 1,
            batches: 1,
            failed_rows: 0,
            errors: vec![],
        };
        let counts = SyncCounts {
            processed: agg.extracted as i64,
            success: (agg.loaded + agg.skipped) as i64,
            failed: (agg.rejected + agg.failed_rows) as i64,
        };
        assert!(counts.success + counts.failed <= counts.processed);
    }
}
