//! Job scheduler infrastructure for background tasks.
//!
//! Jobs fire on timezone-bound cron triggers. For each job kind at most one
//! fire runs at any instant: a trigger that lands while the previous fire is
//! still running is logged and dropped, never queued. Independent kinds may
//! overlap.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::EtlError;

/// The scheduled job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    FullSync,
    IncrementalSync,
    Cleanup,
    PoolMetrics,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FullSync => "full_sync",
            JobKind::IncrementalSync => "incremental_sync",
            JobKind::Cleanup => "cleanup",
            JobKind::PoolMetrics => "pool_metrics",
        }
    }
}

/// A cron expression bound to a timezone.
#[derive(Debug, Clone)]
pub struct JobSchedule {
    schedule: cron::Schedule,
    timezone: Tz,
}

impl JobSchedule {
    /// Parses a POSIX (5-field, minute-precision) or 6-field cron
    /// expression in the given timezone.
    pub fn parse(expression: &str, timezone: Tz) -> Result<Self, EtlError> {
        let normalized = normalize_cron(expression);
        let schedule = cron::Schedule::from_str(&normalized).map_err(|err| {
            EtlError::Configuration(format!("invalid cron expression '{}': {}", expression, err))
        })?;
        Ok(Self { schedule, timezone })
    }

    /// Next fire instant strictly after `after`.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// POSIX cron has five fields; the cron parser wants six. An implied
/// seconds field of `0` keeps minute precision.
fn normalize_cron(expression: &str) -> String {
    let fields = expression.split_whitespace().count();
    if fields == 5 {
        format!("0 {}", expression.trim())
    } else {
        expression.trim().to_string()
    }
}

/// Trait for implementing background jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// The job kind (used for the overlap guard and logging).
    fn kind(&self) -> JobKind;

    /// The trigger schedule.
    fn schedule(&self) -> &JobSchedule;

    /// Execute the job. Returns Ok(()) on success, Err with message on failure.
    async fn execute(&self) -> Result<(), String>;
}

/// Fire counters, readable from the status endpoint.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    total_fires: AtomicU64,
    dropped_fires: AtomicU64,
    failed_fires: AtomicU64,
}

/// Snapshot of the counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchedulerStatsSnapshot {
    pub total_fires: u64,
    pub dropped_fires: u64,
    pub failed_fires: u64,
}

impl SchedulerStats {
    fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            total_fires: self.total_fires.load(Ordering::Relaxed),
            dropped_fires: self.dropped_fires.load(Ordering::Relaxed),
            failed_fires: self.failed_fires.load(Ordering::Relaxed),
        }
    }
}

type RunningSet = Arc<Mutex<HashSet<JobKind>>>;

fn lock_running(running: &RunningSet) -> std::sync::MutexGuard<'_, HashSet<JobKind>> {
    running.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background job scheduler.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    running: RunningSet,
    stats: Arc<SchedulerStats>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            running: Arc::new(Mutex::new(HashSet::new())),
            stats: Arc::new(SchedulerStats::default()),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a job with the scheduler.
    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Start a trigger loop per registered job.
    pub fn start(&mut self) {
        info!("starting job scheduler with {} jobs", self.jobs.len());

        for job in &self.jobs {
            let job = Arc::clone(job);
            let running = Arc::clone(&self.running);
            let stats = Arc::clone(&self.stats);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let kind = job.kind();
                info!(job = kind.as_str(), "job scheduled");

                loop {
                    let now = Utc::now();
                    let Some(next) = job.schedule().next_fire(now) else {
                        warn!(job = kind.as_str(), "schedule yields no further fires");
                        break;
                    };
                    let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            fire(&job, &running, &stats);
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!(job = kind.as_str(), "job trigger loop shutting down");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Kinds currently executing.
    pub fn running_kinds(&self) -> Vec<JobKind> {
        lock_running(&self.running).iter().copied().collect()
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Signals shutdown: no further fires are scheduled. Returns
    /// immediately.
    pub fn shutdown(&self) {
        info!("initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the trigger loops and waits for every in-flight job to drain,
    /// up to the timeout.
    pub async fn stop(mut self, timeout: Duration) {
        self.shutdown();
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                warn!("job trigger loop panicked: {}", err);
            }
        }

        let drained = tokio::time::timeout(timeout, async {
            loop {
                if lock_running(&self.running).is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => info!("all jobs completed gracefully"),
            Err(_) => warn!("job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatches one fire, enforcing at-most-one-per-kind. The job body runs on
/// its own task so the trigger loop keeps observing (and dropping) overlaps.
fn fire(job: &Arc<dyn Job>, running: &RunningSet, stats: &Arc<SchedulerStats>) {
    let kind = job.kind();

    {
        let mut guard = lock_running(running);
        if guard.contains(&kind) {
            warn!(
                job = kind.as_str(),
                "previous run still in progress; dropping this fire"
            );
            stats.dropped_fires.fetch_add(1, Ordering::Relaxed);
            return;
        }
        guard.insert(kind);
    }
    stats.total_fires.fetch_add(1, Ordering::Relaxed);

    let job = Arc::clone(job);
    let running = Arc::clone(running);
    let stats = Arc::clone(stats);
    tokio::spawn(async move {
        let start = std::time::Instant::now();
        info!(job = kind.as_str(), "job starting");

        let result = job.execute().await;
        lock_running(&running).remove(&kind);

        let elapsed_ms = start.elapsed().as_millis();
        match result {
            Ok(()) => info!(job = kind.as_str(), elapsed_ms, "job completed successfully"),
            Err(e) => {
                stats.failed_fires.fetch_add(1, Ordering::Relaxed);
                error!(job = kind.as_str(), elapsed_ms, error = %e, "job failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    fn sao_paulo() -> Tz {
        "America/Sao_Paulo".parse().unwrap()
    }

    struct TestJob {
        kind: JobKind,
        schedule: JobSchedule,
        run_count: Arc<AtomicUsize>,
        hold: Duration,
    }

    impl TestJob {
        fn every_second(kind: JobKind, hold: Duration) -> (Self, Arc<AtomicUsize>) {
            let run_count = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    kind,
                    schedule: JobSchedule::parse("* * * * * *", chrono_tz::UTC).unwrap(),
                    run_count: Arc::clone(&run_count),
                    hold,
                },
                run_count,
            )
        }
    }

    #[async_trait::async_trait]
    impl Job for TestJob {
        fn kind(&self) -> JobKind {
            self.kind
        }

        fn schedule(&self) -> &JobSchedule {
            &self.schedule
        }

        async fn execute(&self) -> Result<(), String> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            Ok(())
        }
    }

    #[test]
    fn test_normalize_cron_five_fields() {
        assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
        assert_eq!(normalize_cron("0 2 * * *"), "0 0 2 * * *");
        // Six fields pass through untouched.
        assert_eq!(normalize_cron("30 0 2 * * *"), "30 0 2 * * *");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(JobSchedule::parse("not a cron", sao_paulo()).is_err());
        assert!(JobSchedule::parse("0 2 * * *", sao_paulo()).is_ok());
    }

    #[test]
    fn test_next_fire_daily_at_two_in_timezone() {
        let schedule = JobSchedule::parse("0 2 * * *", sao_paulo()).unwrap();
        // Reference: 2025-03-10 12:00 UTC = 09:00 in Sao Paulo (UTC-3).
        let after = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let next = schedule.next_fire(after).unwrap();
        // Next 02:00 Sao Paulo is 05:00 UTC on the 11th.
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 11, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_every_fifteen_minutes() {
        let schedule = JobSchedule::parse("*/15 * * * *", chrono_tz::UTC).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 3, 10, 10, 3, 0).unwrap();
        let next = schedule.next_fire(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 10, 15, 0).unwrap());
    }

    #[test]
    fn test_weekly_cleanup_expression_parses() {
        let schedule = JobSchedule::parse("0 3 * * SUN", sao_paulo()).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        assert!(schedule.next_fire(after).is_some());
    }

    #[tokio::test]
    async fn test_overlapping_fire_is_dropped() {
        let scheduler = JobScheduler::new();
        let (job, run_count) =
            TestJob::every_second(JobKind::FullSync, Duration::from_secs(30));
        let job = Arc::new(job) as Arc<dyn Job>;

        // First fire acquires the kind and holds it.
        fire(&job, &scheduler.running, &scheduler.stats);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.running_kinds(), vec![JobKind::FullSync]);

        // A second fire while running is dropped: no new execution, the
        // total counter does not move.
        fire(&job, &scheduler.running, &scheduler.stats);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = scheduler.stats();
        assert_eq!(stats.total_fires, 1);
        assert_eq!(stats.dropped_fires, 1);
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert!(scheduler.running_kinds().len() <= 1);
    }

    #[tokio::test]
    async fn test_independent_kinds_may_overlap() {
        let scheduler = JobScheduler::new();
        let (full, _) = TestJob::every_second(JobKind::FullSync, Duration::from_secs(30));
        let (incr, _) =
            TestJob::every_second(JobKind::IncrementalSync, Duration::from_secs(30));
        let full = Arc::new(full) as Arc<dyn Job>;
        let incr = Arc::new(incr) as Arc<dyn Job>;

        fire(&full, &scheduler.running, &scheduler.stats);
        fire(&incr, &scheduler.running, &scheduler.stats);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut kinds = scheduler.running_kinds();
        kinds.sort_by_key(|k| k.as_str());
        assert_eq!(kinds, vec![JobKind::FullSync, JobKind::IncrementalSync]);
        assert_eq!(scheduler.stats().dropped_fires, 0);
    }

    #[tokio::test]
    async fn test_running_kind_released_after_completion() {
        let scheduler = JobScheduler::new();
        let (job, run_count) =
            TestJob::every_second(JobKind::Cleanup, Duration::from_millis(20));
        let job = Arc::new(job) as Arc<dyn Job>;

        fire(&job, &scheduler.running, &scheduler.stats);
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert!(scheduler.running_kinds().is_empty());

        // The kind is free again: a new fire runs.
        fire(&job, &scheduler.running, &scheduler.stats);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.stats().total_fires, 2);
    }

    #[tokio::test]
    async fn test_scheduler_stop_waits_for_drain() {
        let mut scheduler = JobScheduler::new();
        let (job, _) = TestJob::every_second(JobKind::PoolMetrics, Duration::from_millis(10));
        scheduler.register(job);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop(Duration::from_secs(2)).await;
    }
}
