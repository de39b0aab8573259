//! Process configuration.
//!
//! Layered sources: `config/default`, optional `config/local`, then
//! `ETL__`-prefixed environment variables. Dynamic per-key settings (batch
//! sizes, CPA rules) come from the [`crate::settings::ConfigProvider`]
//! instead; this file covers only what the process needs to boot.

use persistence::db::DatabaseConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source_database: DatabaseSettings,
    pub target_database: DatabaseSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub etl: EtlTuning,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseSettings {
    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// IANA timezone the cron expressions are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_full_sync_cron")]
    pub full_sync_cron: String,

    #[serde(default = "default_incremental_sync_cron")]
    pub incremental_sync_cron: String,

    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,

    #[serde(default = "default_pool_metrics_cron")]
    pub pool_metrics_cron: String,

    /// Pause between tables in a full-sync fire, easing source pressure.
    #[serde(default = "default_full_table_delay")]
    pub full_sync_table_delay_secs: u64,

    #[serde(default = "default_incremental_table_delay")]
    pub incremental_table_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            timezone: default_timezone(),
            full_sync_cron: default_full_sync_cron(),
            incremental_sync_cron: default_incremental_sync_cron(),
            cleanup_cron: default_cleanup_cron(),
            pool_metrics_cron: default_pool_metrics_cron(),
            full_sync_table_delay_secs: default_full_table_delay(),
            incremental_table_delay_secs: default_incremental_table_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtlTuning {
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_source_query_timeout")]
    pub source_query_timeout_secs: u64,

    #[serde(default = "default_target_write_timeout")]
    pub target_write_timeout_secs: u64,

    /// Soft wall-clock budget for one full table sync.
    #[serde(default = "default_full_sync_budget")]
    pub full_sync_budget_secs: u64,

    /// Soft wall-clock budget for one incremental table sync.
    #[serde(default = "default_incremental_sync_budget")]
    pub incremental_sync_budget_secs: u64,

    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

impl Default for EtlTuning {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            source_query_timeout_secs: default_source_query_timeout(),
            target_write_timeout_secs: default_target_write_timeout(),
            full_sync_budget_secs: default_full_sync_budget(),
            incremental_sync_budget_secs: default_incremental_sync_budget(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

// Default value functions
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_scheduler_enabled() -> bool {
    true
}
fn default_timezone() -> String {
    "America/Sao_Paulo".to_string()
}
fn default_full_sync_cron() -> String {
    "0 2 * * *".to_string()
}
fn default_incremental_sync_cron() -> String {
    "*/15 * * * *".to_string()
}
fn default_cleanup_cron() -> String {
    "0 3 * * SUN".to_string()
}
fn default_pool_metrics_cron() -> String {
    "*/5 * * * *".to_string()
}
fn default_full_table_delay() -> u64 {
    5
}
fn default_incremental_table_delay() -> u64 {
    2
}
fn default_batch_size() -> i64 {
    1000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_source_query_timeout() -> u64 {
    60
}
fn default_target_write_timeout() -> u64 {
    120
}
fn default_full_sync_budget() -> u64 {
    3600
}
fn default_incremental_sync_budget() -> u64 {
    300
}
fn default_log_retention_days() -> u32 {
    30
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("ETL").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
