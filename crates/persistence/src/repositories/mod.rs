//! Repository implementations for the target database.

pub mod affiliate_analytics;
pub mod data_cache;
pub mod data_export;
pub mod sync_configuration;
pub mod sync_log;
pub mod user_analytics;

pub use affiliate_analytics::AffiliateAnalyticsRepository;
pub use data_cache::DataCacheRepository;
pub use data_export::DataExportRepository;
pub use sync_configuration::SyncConfigurationRepository;
pub use sync_log::SyncLogRepository;
pub use user_analytics::UserAnalyticsRepository;
