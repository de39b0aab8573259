//! Scheduler trigger expressions and dynamic settings flows.

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use domain::services::cpa::{self, CpaMetrics};
use etl::config::SchedulerConfig;
use etl::jobs::scheduler::JobSchedule;
use etl::settings::{ConfigProvider, StaticConfigProvider};

fn timezone(config: &SchedulerConfig) -> Tz {
    config.timezone.parse().unwrap()
}

#[test]
fn default_cron_expressions_all_parse() {
    let config = SchedulerConfig::default();
    let tz = timezone(&config);
    for expression in [
        &config.full_sync_cron,
        &config.incremental_sync_cron,
        &config.cleanup_cron,
        &config.pool_metrics_cron,
    ] {
        let schedule = JobSchedule::parse(expression, tz).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        assert!(
            schedule.next_fire(after).is_some(),
            "no next fire for '{expression}'"
        );
    }
}

#[test]
fn full_sync_fires_daily_at_two_local() {
    let config = SchedulerConfig::default();
    let schedule = JobSchedule::parse(&config.full_sync_cron, timezone(&config)).unwrap();

    // Sao Paulo sits at UTC-3; 02:00 local is 05:00 UTC.
    let after = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
    let next = schedule.next_fire(after).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 11, 5, 0, 0).unwrap());
}

#[test]
fn incremental_sync_fires_every_fifteen_minutes() {
    let config = SchedulerConfig::default();
    let schedule =
        JobSchedule::parse(&config.incremental_sync_cron, timezone(&config)).unwrap();

    let after = Utc.with_ymd_and_hms(2025, 3, 10, 12, 1, 0).unwrap();
    let first = schedule.next_fire(after).unwrap();
    let second = schedule.next_fire(first).unwrap();
    assert_eq!((second - first).num_minutes(), 15);
}

#[test]
fn cleanup_fires_on_sunday() {
    let config = SchedulerConfig::default();
    let schedule = JobSchedule::parse(&config.cleanup_cron, timezone(&config)).unwrap();

    // 2025-03-10 is a Monday; the next fire lands on Sunday the 16th,
    // 03:00 local = 06:00 UTC.
    let after = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
    let next = schedule.next_fire(after).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 16, 6, 0, 0).unwrap());
}

#[tokio::test]
async fn cpa_rules_from_provider_qualify_seed_user() {
    let provider = StaticConfigProvider::new();
    let rules = provider.cpa_validation_rules().await;
    let amounts = provider.cpa_level_amounts().await;

    let metrics = CpaMetrics {
        total_deposits: 50.0,
        bet_count: 12,
        total_bets: 200.0,
        days_active: 4,
    };
    assert!(cpa::evaluate(&rules, &metrics));
    assert_eq!(amounts.level_1, 50.0);

    let below = CpaMetrics {
        total_deposits: 29.0,
        ..metrics
    };
    assert!(!cpa::evaluate(&rules, &below));
}

#[tokio::test]
async fn pushed_settings_take_effect_on_next_read() {
    let provider = StaticConfigProvider::new();

    let mut rules = provider.cpa_validation_rules().await;
    rules.groups[0].criteria.retain(|c| c.value <= 30.0);
    provider.set_cpa_validation_rules(rules).await;

    let updated = provider.cpa_validation_rules().await;
    assert!(updated.groups[0].criteria.len() < 4);
}
