//! Dynamic configuration provider.
//!
//! The remote configuration service is out of scope; the engine talks to it
//! through [`ConfigProvider`]. Values are read at batch/fire boundaries, so
//! a running batch never observes a change mid-flight.

use async_trait::async_trait;
use domain::models::{
    AnalyticsSettings, CpaLevelAmounts, CpaValidationRules, DataSyncSettings, ExportSettings,
};
use tokio::sync::RwLock;

/// Typed access to the recognized configuration keys.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn data_sync_settings(&self) -> DataSyncSettings;
    async fn analytics_settings(&self) -> AnalyticsSettings;
    async fn export_settings(&self) -> ExportSettings;
    async fn cpa_level_amounts(&self) -> CpaLevelAmounts;
    async fn cpa_validation_rules(&self) -> CpaValidationRules;
}

#[derive(Debug, Clone, Default)]
struct ProviderState {
    data_sync: DataSyncSettings,
    analytics: AnalyticsSettings,
    export: ExportSettings,
    cpa_amounts: CpaLevelAmounts,
    cpa_rules: CpaValidationRules,
}

/// In-memory provider with documented fallbacks. Pushed updates replace the
/// stored value and become visible at the next read.
#[derive(Default)]
pub struct StaticConfigProvider {
    state: RwLock<ProviderState>,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_data_sync_settings(&self, value: DataSyncSettings) {
        self.state.write().await.data_sync = value;
    }

    pub async fn set_analytics_settings(&self, value: AnalyticsSettings) {
        self.state.write().await.analytics = value;
    }

    pub async fn set_export_settings(&self, value: ExportSettings) {
        self.state.write().await.export = value;
    }

    pub async fn set_cpa_level_amounts(&self, value: CpaLevelAmounts) {
        self.state.write().await.cpa_amounts = value;
    }

    pub async fn set_cpa_validation_rules(&self, value: CpaValidationRules) {
        self.state.write().await.cpa_rules = value;
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn data_sync_settings(&self) -> DataSyncSettings {
        self.state.read().await.data_sync.clone()
    }

    async fn analytics_settings(&self) -> AnalyticsSettings {
        self.state.read().await.analytics.clone()
    }

    async fn export_settings(&self) -> ExportSettings {
        self.state.read().await.export.clone()
    }

    async fn cpa_level_amounts(&self) -> CpaLevelAmounts {
        self.state.read().await.cpa_amounts.clone()
    }

    async fn cpa_validation_rules(&self) -> CpaValidationRules {
        self.state.read().await.cpa_rules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_match_documented_fallbacks() {
        let provider = StaticConfigProvider::new();
        let sync = provider.data_sync_settings().await;
        assert_eq!(sync.batch_size, 1000);
        let amounts = provider.cpa_level_amounts().await;
        assert_eq!(amounts.level_1, 50.0);
        let rules = provider.cpa_validation_rules().await;
        assert_eq!(rules.groups.len(), 1);
    }

    #[tokio::test]
    async fn test_update_is_visible_on_next_read() {
        let provider = StaticConfigProvider::new();
        let mut sync = provider.data_sync_settings().await;
        sync.batch_size = 250;
        sync.sync_tables = vec!["users".to_string()];
        provider.set_data_sync_settings(sync).await;

        let updated = provider.data_sync_settings().await;
        assert_eq!(updated.batch_size, 250);
        assert_eq!(updated.sync_tables, vec!["users".to_string()]);
    }
}
