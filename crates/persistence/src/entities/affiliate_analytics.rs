//! Affiliate analytics entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for `affiliate_analytics`.
///
/// Unique on `(affiliate_id, period_type, period_start)`.
#[derive(Debug, Clone, FromRow)]
pub struct AffiliateAnalyticsEntity {
    pub id: Uuid,
    pub affiliate_id: i64,
    pub period_type: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,

    pub total_users: i64,
    pub new_users: i64,
    pub active_users: i64,
    pub cpa_qualified_users: i64,

    pub total_deposits: f64,
    pub total_bets: f64,
    pub total_commissions: f64,

    pub level_1_users: i64,
    pub level_2_users: i64,
    pub level_3_users: i64,
    pub level_4_users: i64,
    pub level_5_users: i64,
    pub level_1_commission: f64,
    pub level_2_commission: f64,
    pub level_3_commission: f64,
    pub level_4_commission: f64,
    pub level_5_commission: f64,

    pub conversion_rate: f64,
    pub retention_rate: f64,
    pub avg_user_value: f64,

    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
