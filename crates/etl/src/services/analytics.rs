//! Period-bucketed analytics aggregation.
//!
//! Reads raw operational rows from the source database through the
//! extractor and upserts per-user and per-affiliate rollups keyed on
//! `(entity, period_type, period_start)`.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::models::{AffiliateAnalytics, CpaLevelAmounts, CpaValidationRules, FilterValue, UserAnalytics};
use domain::services::cpa::{self, CpaMetrics};
use indexmap::IndexMap;
use persistence::entities::{AffiliateAnalyticsEntity, UserAnalyticsEntity};
use persistence::repositories::{AffiliateAnalyticsRepository, UserAnalyticsRepository};
use serde_json::json;
use shared::period::{resolve_period, Period, PeriodType};
use shared::value::Row;

use crate::error::{EtlError, Result};
use crate::services::extract::{SourceReader, TimeWindow};
use crate::settings::ConfigProvider;

/// Upper bound on rows fetched per window query.
const WINDOW_FETCH_LIMIT: i64 = 50_000;

/// Depth of the affiliate downline walk.
const MLM_LEVELS: usize = 5;

/// Computes and upserts period analytics rollups.
#[derive(Clone)]
pub struct AnalyticsEngine {
    reader: SourceReader,
    user_analytics: UserAnalyticsRepository,
    affiliate_analytics: AffiliateAnalyticsRepository,
    provider: Arc<dyn ConfigProvider>,
}

impl AnalyticsEngine {
    pub fn new(
        reader: SourceReader,
        user_analytics: UserAnalyticsRepository,
        affiliate_analytics: AffiliateAnalyticsRepository,
        provider: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            reader,
            user_analytics,
            affiliate_analytics,
            provider,
        }
    }

    /// Generates the rollup for one user and period. Returns `None` when the
    /// user does not exist on the source.
    pub async fn generate_user_analytics(
        &self,
        user_id: i64,
        period_type: PeriodType,
        reference: Option<DateTime<Utc>>,
    ) -> Result<Option<UserAnalyticsEntity>> {
        let period = resolve_period(period_type, reference.unwrap_or_else(Utc::now));

        let user = self.fetch_by_id("users", user_id).await?;
        if user.is_none() {
            return Ok(None);
        }

        let deposits = self.fetch_user_window("deposits", user_id, &period).await?;
        let bets = self.fetch_user_window("bets", user_id, &period).await?;
        let transactions = self
            .fetch_user_window("transactions", user_id, &period)
            .await?;

        let rules = self.provider.cpa_validation_rules().await;
        let amounts = self.provider.cpa_level_amounts().await;

        let row = compute_user_analytics(
            user_id,
            period_type,
            &period,
            &deposits,
            &bets,
            &transactions,
            &rules,
            &amounts,
        );
        row.check_invariants().map_err(EtlError::Invariant)?;

        let entity = self.user_analytics.upsert(&row).await.map_err(EtlError::from)?;
        Ok(Some(entity))
    }

    /// Generates the rollup for one affiliate and period. Returns `None`
    /// when the affiliate does not exist on the source.
    pub async fn generate_affiliate_analytics(
        &self,
        affiliate_id: i64,
        period_type: PeriodType,
        reference: Option<DateTime<Utc>>,
    ) -> Result<Option<AffiliateAnalyticsEntity>> {
        let period = resolve_period(period_type, reference.unwrap_or_else(Utc::now));

        let affiliate = self.fetch_by_id("users", affiliate_id).await?;
        if affiliate.is_none() {
            return Ok(None);
        }

        // Walk the referral chain one level at a time, at most five deep.
        let mut level_ids: Vec<Vec<i64>> = Vec::with_capacity(MLM_LEVELS);
        let mut level_one_rows: Vec<Row> = Vec::new();
        let mut current = vec![affiliate_id];
        for level in 0..MLM_LEVELS {
            if current.is_empty() {
                level_ids.push(Vec::new());
                continue;
            }
            let rows = self.fetch_referred_by(&current).await?;
            let ids: Vec<i64> = rows
                .iter()
                .filter_map(|row| row.get("id").and_then(|v| v.as_i64()))
                .collect();
            if level == 0 {
                level_one_rows = rows;
            }
            level_ids.push(ids.clone());
            current = ids;
        }

        let direct_ids = level_ids.first().cloned().unwrap_or_default();
        let total_users = direct_ids.len() as i64;
        let new_users = level_one_rows
            .iter()
            .filter(|row| {
                row.get("created_at")
                    .and_then(|v| v.as_timestamp())
                    .map(|ts| ts >= period.start && ts <= period.end)
                    .unwrap_or(false)
            })
            .count() as i64;

        let (bets_rows, deposits_rows) = if direct_ids.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (
                self.fetch_users_window("bets", &direct_ids, &period).await?,
                self.fetch_users_window("deposits", &direct_ids, &period)
                    .await?,
            )
        };

        let active_users = bets_rows
            .iter()
            .filter_map(|row| row.get("user_id").and_then(|v| v.as_i64()))
            .collect::<BTreeSet<i64>>()
            .len() as i64;
        let total_deposits = sum_field(&deposits_rows, "amount");
        let total_bets = sum_field(&bets_rows, "amount");

        let amounts = self.provider.cpa_level_amounts().await;
        let mut qualified_by_level = [0i64; MLM_LEVELS];
        for (index, ids) in level_ids.iter().enumerate() {
            if ids.is_empty() {
                continue;
            }
            qualified_by_level[index] = self
                .user_analytics
                .count_qualified(ids, period_type, period.start)
                .await
                .map_err(EtlError::from)?;
        }

        // TODO: replace the CPA-based commission estimate with the per-bet
        // commission ledger once it is synced from the source.
        let commission = |level: usize| qualified_by_level[level] as f64 * amounts.for_level(level as u8 + 1);

        let cpa_qualified_users = qualified_by_level[0];
        let conversion_rate = ratio(cpa_qualified_users, total_users);
        // TODO: retention should compare against the previous period's
        // active set once that rollup is queryable here.
        let retention_rate = ratio(active_users, total_users);
        let avg_user_value = if total_users > 0 {
            (total_deposits / total_users as f64).max(0.0)
        } else {
            0.0
        };

        let row = AffiliateAnalytics {
            affiliate_id,
            period_type,
            period_start: period.start,
            period_end: period.end,
            total_users,
            new_users,
            active_users,
            cpa_qualified_users,
            total_deposits,
            total_bets,
            total_commissions: (0..MLM_LEVELS).map(commission).sum(),
            level_1_users: level_ids[0].len() as i64,
            level_2_users: level_ids[1].len() as i64,
            level_3_users: level_ids[2].len() as i64,
            level_4_users: level_ids[3].len() as i64,
            level_5_users: level_ids[4].len() as i64,
            level_1_commission: commission(0),
            level_2_commission: commission(1),
            level_3_commission: commission(2),
            level_4_commission: commission(3),
            level_5_commission: commission(4),
            conversion_rate,
            retention_rate,
            avg_user_value,
        };
        row.check_invariants().map_err(EtlError::Invariant)?;

        let entity = self
            .affiliate_analytics
            .upsert(&row)
            .await
            .map_err(EtlError::from)?;
        Ok(Some(entity))
    }

    async fn fetch_by_id(&self, table: &str, id: i64) -> Result<Option<Row>> {
        let filters = IndexMap::from([("id".to_string(), FilterValue::Scalar(json!(id)))]);
        let rows = self.reader.fetch_rows(table, &filters, None, "id", 1).await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_user_window(
        &self,
        table: &str,
        user_id: i64,
        period: &Period,
    ) -> Result<Vec<Row>> {
        let filters =
            IndexMap::from([("user_id".to_string(), FilterValue::Scalar(json!(user_id)))]);
        self.reader
            .fetch_rows(
                table,
                &filters,
                Some(&TimeWindow {
                    column: "created_at".to_string(),
                    from: period.start,
                    to: period.end,
                }),
                "created_at",
                WINDOW_FETCH_LIMIT,
            )
            .await
    }

    async fn fetch_users_window(
        &self,
        table: &str,
        user_ids: &[i64],
        period: &Period,
    ) -> Result<Vec<Row>> {
        let ids: Vec<serde_json::Value> = user_ids.iter().map(|id| json!(id)).collect();
        let filters = IndexMap::from([("user_id".to_string(), FilterValue::List(ids))]);
        self.reader
            .fetch_rows(
                table,
                &filters,
                Some(&TimeWindow {
                    column: "created_at".to_string(),
                    from: period.start,
                    to: period.end,
                }),
                "created_at",
                WINDOW_FETCH_LIMIT,
            )
            .await
    }

    async fn fetch_referred_by(&self, referrer_ids: &[i64]) -> Result<Vec<Row>> {
        let ids: Vec<serde_json::Value> = referrer_ids.iter().map(|id| json!(id)).collect();
        let filters = IndexMap::from([("referrer_id".to_string(), FilterValue::List(ids))]);
        self.reader
            .fetch_rows("users", &filters, None, "id", WINDOW_FETCH_LIMIT)
            .await
    }
}

/// Min/max/total aggregation over an amount column.
#[derive(Debug, Default, Clone, Copy)]
struct AmountMetrics {
    total: f64,
    count: i64,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    avg: f64,
}

fn amount_metrics(rows: &[Row], amount_column: &str, date_column: &str) -> AmountMetrics {
    let mut metrics = AmountMetrics {
        count: rows.len() as i64,
        ..Default::default()
    };
    for row in rows {
        if let Some(amount) = row.get(amount_column).and_then(|v| v.as_f64()) {
            metrics.total += amount;
        }
        if let Some(ts) = row.get(date_column).and_then(|v| v.as_timestamp()) {
            metrics.first = Some(metrics.first.map_or(ts, |cur| cur.min(ts)));
            metrics.last = Some(metrics.last.map_or(ts, |cur| cur.max(ts)));
        }
    }
    if metrics.count > 0 {
        metrics.avg = metrics.total / metrics.count as f64;
    }
    metrics
}

fn sum_field(rows: &[Row], column: &str) -> f64 {
    rows.iter()
        .filter_map(|row| row.get(column).and_then(|v| v.as_f64()))
        .sum()
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        return 0.0;
    }
    (numerator as f64 / denominator as f64).clamp(0.0, 1.0)
}

/// Pure metric computation for one user and period.
#[allow(clippy::too_many_arguments)]
fn compute_user_analytics(
    user_id: i64,
    period_type: PeriodType,
    period: &Period,
    deposits: &[Row],
    bets: &[Row],
    transactions: &[Row],
    rules: &CpaValidationRules,
    amounts: &CpaLevelAmounts,
) -> UserAnalytics {
    let deposit_metrics = amount_metrics(deposits, "amount", "created_at");
    let bet_metrics = amount_metrics(bets, "amount", "created_at");

    // Activity: distinct calendar dates observed across transactions and
    // bets. Session figures are heuristic estimates.
    // TODO: replace the session heuristics with session-boundary detection
    // over transaction timestamps once session events are synced.
    let days_active = transactions
        .iter()
        .chain(bets.iter())
        .filter_map(|row| row.get("created_at").and_then(|v| v.as_timestamp()))
        .map(|ts| ts.date_naive())
        .collect::<BTreeSet<_>>()
        .len() as i64;
    let total_activity = (transactions.len() + bets.len()) as i64;
    let sessions_count = (total_activity + 9) / 10;
    let total_session_time_minutes = total_activity * 5;

    let mut total_wins = 0.0;
    let mut total_losses = 0.0;
    for bet in bets {
        match bet.get("result").and_then(|v| v.as_str()) {
            Some("win") => {
                if let Some(amount) = bet.get("win_amount").and_then(|v| v.as_f64()) {
                    total_wins += amount;
                }
            }
            Some("loss") => {
                if let Some(amount) = bet.get("amount").and_then(|v| v.as_f64()) {
                    total_losses += amount;
                }
            }
            _ => {}
        }
    }

    let metrics = CpaMetrics {
        total_deposits: deposit_metrics.total,
        bet_count: bet_metrics.count,
        total_bets: bet_metrics.total,
        days_active,
    };
    let cpa_qualified = cpa::evaluate(rules, &metrics);

    UserAnalytics {
        user_id,
        period_type,
        period_start: period.start,
        period_end: period.end,
        total_deposits: deposit_metrics.total,
        deposit_count: deposit_metrics.count,
        first_deposit_date: deposit_metrics.first,
        last_deposit_date: deposit_metrics.last,
        avg_deposit_amount: deposit_metrics.avg,
        total_bets: bet_metrics.total,
        bet_count: bet_metrics.count,
        first_bet_date: bet_metrics.first,
        last_bet_date: bet_metrics.last,
        avg_bet_amount: bet_metrics.avg,
        days_active,
        sessions_count,
        total_session_time_minutes,
        total_wins,
        total_losses,
        net_result: total_wins - total_losses,
        cpa_qualified,
        cpa_qualification_date: if cpa_qualified { Some(Utc::now()) } else { None },
        cpa_amount: if cpa_qualified { amounts.level_1 } else { 0.0 },
    }
}
