//! Domain models for the data-sync backend.

pub mod analytics;
pub mod cpa;
pub mod data_export;
pub mod settings;
pub mod sync_log;
pub mod table_config;

pub use analytics::{AffiliateAnalytics, UserAnalytics};
pub use cpa::{CpaCriterion, CpaCriterionType, CpaLevelAmounts, CpaValidationRules, RuleOperator};
pub use data_export::{ExportFormat, ExportStatus};
pub use settings::{AnalyticsSettings, DataSyncSettings, ExportSettings};
pub use sync_log::{SyncMode, SyncOperation, SyncStatus};
pub use table_config::{FilterOp, FilterValue, TableConfig, TableRegistry, ValidationRules};
