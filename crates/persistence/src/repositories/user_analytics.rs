//! User analytics repository.

use chrono::{DateTime, Utc};
use domain::models::UserAnalytics;
use shared::period::PeriodType;
use sqlx::PgPool;

use crate::entities::UserAnalyticsEntity;

const RETURNING: &str = "id, user_id, period_type, period_start, period_end, \
     total_deposits, deposit_count, first_deposit_date, last_deposit_date, avg_deposit_amount, \
     total_bets, bet_count, first_bet_date, last_bet_date, avg_bet_amount, \
     days_active, sessions_count, total_session_time_minutes, \
     total_wins, total_losses, net_result, \
     cpa_qualified, cpa_qualification_date, cpa_amount, last_updated, created_at";

/// Repository for `user_analytics` period rollups.
#[derive(Clone)]
pub struct UserAnalyticsRepository {
    pool: PgPool,
}

impl UserAnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a rollup by `(user_id, period_type, period_start)`.
    ///
    /// A conflicting row is replaced field-by-field and its `last_updated`
    /// advances; `created_at` is preserved.
    pub async fn upsert(
        &self,
        row: &UserAnalytics,
    ) -> Result<UserAnalyticsEntity, sqlx::Error> {
        sqlx::query_as::<_, UserAnalyticsEntity>(&format!(
            r#"
            INSERT INTO user_analytics (
                user_id, period_type, period_start, period_end,
                total_deposits, deposit_count, first_deposit_date, last_deposit_date,
                avg_deposit_amount,
                total_bets, bet_count, first_bet_date, last_bet_date, avg_bet_amount,
                days_active, sessions_count, total_session_time_minutes,
                total_wins, total_losses, net_result,
                cpa_qualified, cpa_qualification_date, cpa_amount,
                last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, NOW())
            ON CONFLICT (user_id, period_type, period_start) DO UPDATE SET
                period_end = EXCLUDED.period_end,
                total_deposits = EXCLUDED.total_deposits,
                deposit_count = EXCLUDED.deposit_count,
                first_deposit_date = EXCLUDED.first_deposit_date,
                last_deposit_date = EXCLUDED.last_deposit_date,
                avg_deposit_amount = EXCLUDED.avg_deposit_amount,
                total_bets = EXCLUDED.total_bets,
                bet_count = EXCLUDED.bet_count,
                first_bet_date = EXCLUDED.first_bet_date,
                last_bet_date = EXCLUDED.last_bet_date,
                avg_bet_amount = EXCLUDED.avg_bet_amount,
                days_active = EXCLUDED.days_active,
                sessions_count = EXCLUDED.sessions_count,
                total_session_time_minutes = EXCLUDED.total_session_time_minutes,
                total_wins = EXCLUDED.total_wins,
                total_losses = EXCLUDED.total_losses,
                net_result = EXCLUDED.net_result,
                cpa_qualified = EXCLUDED.cpa_qualified,
                cpa_qualification_date = EXCLUDED.cpa_qualification_date,
                cpa_amount = EXCLUDED.cpa_amount,
                last_updated = NOW()
            RETURNING {RETURNING}
            "#,
        ))
        .bind(row.user_id)
        .bind(row.period_type.as_str())
        .bind(row.period_start)
        .bind(row.period_end)
        .bind(row.total_deposits)
        .bind(row.deposit_count)
        .bind(row.first_deposit_date)
        .bind(row.last_deposit_date)
        .bind(row.avg_deposit_amount)
        .bind(row.total_bets)
        .bind(row.bet_count)
        .bind(row.first_bet_date)
        .bind(row.last_bet_date)
        .bind(row.avg_bet_amount)
        .bind(row.days_active)
        .bind(row.sessions_count)
        .bind(row.total_session_time_minutes)
        .bind(row.total_wins)
        .bind(row.total_losses)
        .bind(row.net_result)
        .bind(row.cpa_qualified)
        .bind(row.cpa_qualification_date)
        .bind(row.cpa_amount)
        .fetch_one(&self.pool)
        .await
    }

    /// Fetches a rollup by its uniqueness key.
    pub async fn find(
        &self,
        user_id: i64,
        period_type: PeriodType,
        period_start: DateTime<Utc>,
    ) -> Result<Option<UserAnalyticsEntity>, sqlx::Error> {
        sqlx::query_as::<_, UserAnalyticsEntity>(&format!(
            r#"
            SELECT {RETURNING}
            FROM user_analytics
            WHERE user_id = $1 AND period_type = $2 AND period_start = $3
            "#,
        ))
        .bind(user_id)
        .bind(period_type.as_str())
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await
    }

    /// Counts CPA-qualified users among the given ids for one period.
    pub async fn count_qualified(
        &self,
        user_ids: &[i64],
        period_type: PeriodType,
        period_start: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM user_analytics
            WHERE user_id = ANY($1)
              AND period_type = $2
              AND period_start = $3
              AND cpa_qualified
            "#,
        )
        .bind(user_ids.to_vec())
        .bind(period_type.as_str())
        .bind(period_start)
        .fetch_one(&self.pool)
        .await
    }

    /// Deletes rollups whose period ended before the retention window.
    pub async fn prune_older_than(&self, retention_days: u32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_analytics
            WHERE period_end < NOW() - ($1 || ' days')::INTERVAL
            "#,
        )
        .bind(retention_days as i32)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
