//! Affiliate analytics repository.

use chrono::{DateTime, Utc};
use domain::models::AffiliateAnalytics;
use shared::period::PeriodType;
use sqlx::PgPool;

use crate::entities::AffiliateAnalyticsEntity;

const RETURNING: &str = "id, affiliate_id, period_type, period_start, period_end, \
     total_users, new_users, active_users, cpa_qualified_users, \
     total_deposits, total_bets, total_commissions, \
     level_1_users, level_2_users, level_3_users, level_4_users, level_5_users, \
     level_1_commission, level_2_commission, level_3_commission, level_4_commission, \
     level_5_commission, conversion_rate, retention_rate, avg_user_value, \
     last_updated, created_at";

/// Repository for `affiliate_analytics` period rollups.
#[derive(Clone)]
pub struct AffiliateAnalyticsRepository {
    pool: PgPool,
}

impl AffiliateAnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a rollup by `(affiliate_id, period_type, period_start)`.
    pub async fn upsert(
        &self,
        row: &AffiliateAnalytics,
    ) -> Result<AffiliateAnalyticsEntity, sqlx::Error> {
        sqlx::query_as::<_, AffiliateAnalyticsEntity>(&format!(
            r#"
            INSERT INTO affiliate_analytics (
                affiliate_id, period_type, period_start, period_end,
                total_users, new_users, active_users, cpa_qualified_users,
                total_deposits, total_bets, total_commissions,
                level_1_users, level_2_users, level_3_users, level_4_users, level_5_users,
                level_1_commission, level_2_commission, level_3_commission,
                level_4_commission, level_5_commission,
                conversion_rate, retention_rate, avg_user_value,
                last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, NOW())
            ON CONFLICT (affiliate_id, period_type, period_start) DO UPDATE SET
                period_end = EXCLUDED.period_end,
                total_users = EXCLUDED.total_users,
                new_users = EXCLUDED.new_users,
                active_users = EXCLUDED.active_users,
                cpa_qualified_users = EXCLUDED.cpa_qualified_users,
                total_deposits = EXCLUDED.total_deposits,
                total_bets = EXCLUDED.total_bets,
                total_commissions = EXCLUDED.total_commissions,
                level_1_users = EXCLUDED.level_1_users,
                level_2_users = EXCLUDED.level_2_users,
                level_3_users = EXCLUDED.level_3_users,
                level_4_users = EXCLUDED.level_4_users,
                level_5_users = EXCLUDED.level_5_users,
                level_1_commission = EXCLUDED.level_1_commission,
                level_2_commission = EXCLUDED.level_2_commission,
                level_3_commission = EXCLUDED.level_3_commission,
                level_4_commission = EXCLUDED.level_4_commission,
                level_5_commission = EXCLUDED.level_5_commission,
                conversion_rate = EXCLUDED.conversion_rate,
                retention_rate = EXCLUDED.retention_rate,
                avg_user_value = EXCLUDED.avg_user_value,
                last_updated = NOW()
            RETURNING {RETURNING}
            "#,
        ))
        .bind(row.affiliate_id)
        .bind(row.period_type.as_str())
        .bind(row.period_start)
        .bind(row.period_end)
        .bind(row.total_users)
        .bind(row.new_users)
        .bind(row.active_users)
        .bind(row.cpa_qualified_users)
        .bind(row.total_deposits)
        .bind(row.total_bets)
        .bind(row.total_commissions)
        .bind(row.level_1_users)
        .bind(row.level_2_users)
        .bind(row.level_3_users)
        .bind(row.level_4_users)
        .bind(row.level_5_users)
        .bind(row.level_1_commission)
        .bind(row.level_2_commission)
        .bind(row.level_3_commission)
        .bind(row.level_4_commission)
        .bind(row.level_5_commission)
        .bind(row.conversion_rate)
        .bind(row.retention_rate)
        .bind(row.avg_user_value)
        .fetch_one(&self.pool)
        .await
    }

    /// Fetches a rollup by its uniqueness key.
    pub async fn find(
        &self,
        affiliate_id: i64,
        period_type: PeriodType,
        period_start: DateTime<Utc>,
    ) -> Result<Option<AffiliateAnalyticsEntity>, sqlx::Error> {
        sqlx::query_as::<_, AffiliateAnalyticsEntity>(&format!(
            r#"
            SELECT {RETURNING}
            FROM affiliate_analytics
            WHERE affiliate_id = $1 AND period_type = $2 AND period_start = $3
            "#,
        ))
        .bind(affiliate_id)
        .bind(period_type.as_str())
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await
    }
}
