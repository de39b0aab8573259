//! Database entities for the target database.

pub mod affiliate_analytics;
pub mod data_cache;
pub mod data_export;
pub mod sync_configuration;
pub mod sync_log;
pub mod user_analytics;

pub use affiliate_analytics::AffiliateAnalyticsEntity;
pub use data_cache::DataCacheEntity;
pub use data_export::DataExportEntity;
pub use sync_configuration::SyncConfigurationEntity;
pub use sync_log::SyncLogEntity;
pub use user_analytics::UserAnalyticsEntity;
