//! Dynamic runtime settings served by the configuration provider.
//!
//! Each struct mirrors one recognized configuration key and carries the
//! documented fallbacks in its `Default` implementation. Settings are read
//! at batch/fire boundaries; a running batch never observes a change.

use serde::{Deserialize, Serialize};
use shared::period::PeriodType;

use super::data_export::ExportFormat;

/// `data_sync_settings` configuration key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSyncSettings {
    #[serde(default = "default_sync_interval_minutes")]
    pub sync_interval_minutes: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    #[serde(default)]
    pub enable_real_time: bool,

    /// Source tables eligible for sync; empty means all configured tables.
    #[serde(default)]
    pub sync_tables: Vec<String>,
}

impl Default for DataSyncSettings {
    fn default() -> Self {
        Self {
            sync_interval_minutes: default_sync_interval_minutes(),
            batch_size: default_batch_size(),
            max_retry_attempts: default_max_retry_attempts(),
            enable_real_time: false,
            sync_tables: Vec::new(),
        }
    }
}

/// `analytics_settings` configuration key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSettings {
    #[serde(default = "default_analytics_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_aggregation_intervals")]
    pub aggregation_intervals: Vec<PeriodType>,

    #[serde(default)]
    pub enable_real_time_analytics: bool,

    #[serde(default = "default_cache_duration_minutes")]
    pub cache_duration_minutes: u32,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            retention_days: default_analytics_retention_days(),
            aggregation_intervals: default_aggregation_intervals(),
            enable_real_time_analytics: false,
            cache_duration_minutes: default_cache_duration_minutes(),
        }
    }
}

/// `export_settings` configuration key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u32,

    #[serde(default = "default_export_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<ExportFormat>,

    #[serde(default = "default_compression_enabled")]
    pub compression_enabled: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            retention_days: default_export_retention_days(),
            allowed_formats: default_allowed_formats(),
            compression_enabled: default_compression_enabled(),
        }
    }
}

fn default_sync_interval_minutes() -> u32 {
    15
}
fn default_batch_size() -> i64 {
    1000
}
fn default_max_retry_attempts() -> u32 {
    3
}
fn default_analytics_retention_days() -> u32 {
    365
}
fn default_aggregation_intervals() -> Vec<PeriodType> {
    vec![PeriodType::Daily, PeriodType::Weekly, PeriodType::Monthly]
}
fn default_cache_duration_minutes() -> u32 {
    30
}
fn default_max_file_size_mb() -> u32 {
    100
}
fn default_export_retention_days() -> u32 {
    7
}
fn default_allowed_formats() -> Vec<ExportFormat> {
    vec![ExportFormat::Csv, ExportFormat::Json, ExportFormat::Xlsx]
}
fn default_compression_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_sync_defaults() {
        let settings = DataSyncSettings::default();
        assert_eq!(settings.sync_interval_minutes, 15);
        assert_eq!(settings.batch_size, 1000);
        assert_eq!(settings.max_retry_attempts, 3);
        assert!(settings.sync_tables.is_empty());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let settings: DataSyncSettings =
            serde_json::from_str(r#"{"batch_size": 250}"#).unwrap();
        assert_eq!(settings.batch_size, 250);
        assert_eq!(settings.sync_interval_minutes, 15);
    }

    #[test]
    fn test_analytics_defaults() {
        let settings = AnalyticsSettings::default();
        assert_eq!(settings.retention_days, 365);
        assert_eq!(settings.aggregation_intervals.len(), 3);
        assert_eq!(settings.cache_duration_minutes, 30);
    }

    #[test]
    fn test_export_defaults() {
        let settings = ExportSettings::default();
        assert_eq!(settings.max_file_size_mb, 100);
        assert_eq!(settings.retention_days, 7);
        assert!(settings.allowed_formats.contains(&ExportFormat::Csv));
        assert!(settings.compression_enabled);
    }
}
