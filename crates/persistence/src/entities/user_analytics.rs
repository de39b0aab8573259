//! User analytics entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for `user_analytics`.
///
/// Unique on `(user_id, period_type, period_start)`.
#[derive(Debug, Clone, FromRow)]
pub struct UserAnalyticsEntity {
    pub id: Uuid,
    pub user_id: i64,
    pub period_type: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,

    pub total_deposits: f64,
    pub deposit_count: i64,
    pub first_deposit_date: Option<DateTime<Utc>>,
    pub last_deposit_date: Option<DateTime<Utc>>,
    pub avg_deposit_amount: f64,

    pub total_bets: f64,
    pub bet_count: i64,
    pub first_bet_date: Option<DateTime<Utc>>,
    pub last_bet_date: Option<DateTime<Utc>>,
    pub avg_bet_amount: f64,

    pub days_active: i64,
    pub sessions_count: i64,
    pub total_session_time_minutes: i64,

    pub total_wins: f64,
    pub total_losses: f64,
    pub net_result: f64,

    pub cpa_qualified: bool,
    pub cpa_qualification_date: Option<DateTime<Utc>>,
    pub cpa_amount: f64,

    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
