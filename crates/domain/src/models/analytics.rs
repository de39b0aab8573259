//! Analytics write models.
//!
//! These are the rows the analytics engine computes and upserts. Database
//! entities live in the persistence crate; this module owns the invariants
//! enforced before any write.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::period::PeriodType;

/// Per-user period rollup.
#[derive(Debug, Clone, Serialize)]
pub struct UserAnalytics {
    pub user_id: i64,
    pub period_type: PeriodType,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,

    // Deposit metrics.
    pub total_deposits: f64,
    pub deposit_count: i64,
    pub first_deposit_date: Option<DateTime<Utc>>,
    pub last_deposit_date: Option<DateTime<Utc>>,
    pub avg_deposit_amount: f64,

    // Bet metrics.
    pub total_bets: f64,
    pub bet_count: i64,
    pub first_bet_date: Option<DateTime<Utc>>,
    pub last_bet_date: Option<DateTime<Utc>>,
    pub avg_bet_amount: f64,

    // Activity metrics.
    pub days_active: i64,
    pub sessions_count: i64,
    pub total_session_time_minutes: i64,

    // Result metrics. net_result is derived: wins minus losses.
    pub total_wins: f64,
    pub total_losses: f64,
    pub net_result: f64,

    // CPA metrics.
    pub cpa_qualified: bool,
    pub cpa_qualification_date: Option<DateTime<Utc>>,
    pub cpa_amount: f64,
}

impl UserAnalytics {
    /// Checks the row invariants enforced at write time.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.period_end <= self.period_start {
            return Err(format!(
                "period_end {} must be after period_start {}",
                self.period_end, self.period_start
            ));
        }
        let non_negative = [
            ("total_deposits", self.total_deposits),
            ("avg_deposit_amount", self.avg_deposit_amount),
            ("total_bets", self.total_bets),
            ("avg_bet_amount", self.avg_bet_amount),
            ("total_wins", self.total_wins),
            ("total_losses", self.total_losses),
            ("cpa_amount", self.cpa_amount),
        ];
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(format!("{} must be non-negative, got {}", name, value));
            }
        }
        let counts = [
            ("deposit_count", self.deposit_count),
            ("bet_count", self.bet_count),
            ("days_active", self.days_active),
            ("sessions_count", self.sessions_count),
            ("total_session_time_minutes", self.total_session_time_minutes),
        ];
        for (name, value) in counts {
            if value < 0 {
                return Err(format!("{} must be non-negative, got {}", name, value));
            }
        }
        if (self.net_result - (self.total_wins - self.total_losses)).abs() > 1e-9 {
            return Err(format!(
                "net_result {} must equal total_wins - total_losses ({})",
                self.net_result,
                self.total_wins - self.total_losses
            ));
        }
        Ok(())
    }
}

/// Per-affiliate period rollup.
#[derive(Debug, Clone, Serialize)]
pub struct AffiliateAnalytics {
    pub affiliate_id: i64,
    pub period_type: PeriodType,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,

    // User counts.
    pub total_users: i64,
    pub new_users: i64,
    pub active_users: i64,
    pub cpa_qualified_users: i64,

    // Financial aggregates.
    pub total_deposits: f64,
    pub total_bets: f64,
    pub total_commissions: f64,

    // Downline (levels 1..5) user counts and commission sums.
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

    // Derived rates.
    pub conversion_rate: f64,
    pub retention_rate: f64,
    pub avg_user_value: f64,
}

impl AffiliateAnalytics {
    /// Checks the row invariants enforced at write time.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.period_end <= self.period_start {
            return Err(format!(
                "period_end {} must be after period_start {}",
                self.period_end, self.period_start
            ));
        }
        for (name, value) in [
            ("conversion_rate", self.conversion_rate),
            ("retention_rate", self.retention_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must lie in [0, 1], got {}", name, value));
            }
        }
        if self.avg_user_value < 0.0 {
            return Err(format!(
                "avg_user_value must be non-negative, got {}",
                self.avg_user_value
            ));
        }
        let counts = [
            ("total_users", self.total_users),
            ("new_users", self.new_users),
            ("active_users", self.active_users),
            ("cpa_qualified_users", self.cpa_qualified_users),
            ("level_1_users", self.level_1_users),
            ("level_2_users", self.level_2_users),
            ("level_3_users", self.level_3_users),
            ("level_4_users", self.level_4_users),
            ("level_5_users", self.level_5_users),
        ];
        for (name, value) in counts {
            if value < 0 {
                return Err(format!("{} must be non-negative, got {}", name, value));
            }
        }
        Ok(())
    }

    pub fn level_users(&self, level: u8) -> i64 {
        match level {
            1 => self.level_1_users,
            2 => self.level_2_users,
            3 => self.level_3_users,
            4 => self.level_4_users,
            5 => self.level_5_users,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_user_row() -> UserAnalytics {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        UserAnalytics {
            user_id: 42,
            period_type: PeriodType::Daily,
            period_start: start,
            period_end: start + chrono::Duration::days(1) - chrono::Duration::milliseconds(1),
            total_deposits: 50.0,
            deposit_count: 2,
            first_deposit_date: Some(start),
            last_deposit_date: Some(start),
            avg_deposit_amount: 25.0,
            total_bets: 200.0,
            bet_count: 12,
            first_bet_date: Some(start),
            last_bet_date: Some(start),
            avg_bet_amount: 200.0 / 12.0,
            days_active: 4,
            sessions_count: 2,
            total_session_time_minutes: 70,
            total_wins: 120.0,
            total_losses: 80.0,
            net_result: 40.0,
            cpa_qualified: true,
            cpa_qualification_date: Some(start),
            cpa_amount: 50.0,
        }
    }

    #[test]
    fn test_user_invariants_hold() {
        assert!(sample_user_row().check_invariants().is_ok());
    }

    #[test]
    fn test_user_invariant_net_result() {
        let mut row = sample_user_row();
        row.net_result = 0.0;
        let err = row.check_invariants().unwrap_err();
        assert!(err.contains("net_result"));
    }

    #[test]
    fn test_user_invariant_period_bounds() {
        let mut row = sample_user_row();
        row.period_end = row.period_start;
        assert!(row.check_invariants().is_err());
    }

    #[test]
    fn test_user_invariant_negative_amount() {
        let mut row = sample_user_row();
        row.total_deposits = -1.0;
        assert!(row.check_invariants().is_err());
    }

    fn sample_affiliate_row() -> AffiliateAnalytics {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        AffiliateAnalytics {
            affiliate_id: 7,
            period_type: PeriodType::Monthly,
            period_start: start,
            period_end: start + chrono::Duration::days(31) - chrono::Duration::milliseconds(1),
            total_users: 20,
            new_users: 5,
            active_users: 12,
            cpa_qualified_users: 4,
            total_deposits: 1500.0,
            total_bets: 9000.0,
            total_commissions: 260.0,
            level_1_users: 20,
            level_2_users: 8,
            level_3_users: 2,
            level_4_users: 0,
            level_5_users: 0,
            level_1_commission: 200.0,
            level_2_commission: 40.0,
            level_3_commission: 20.0,
            level_4_commission: 0.0,
            level_5_commission: 0.0,
            conversion_rate: 0.2,
            retention_rate: 0.6,
            avg_user_value: 75.0,
        }
    }

    #[test]
    fn test_affiliate_invariants_hold() {
        assert!(sample_affiliate_row().check_invariants().is_ok());
    }

    #[test]
    fn test_affiliate_rate_bounds() {
        let mut row = sample_affiliate_row();
        row.conversion_rate = 1.2;
        assert!(row.check_invariants().is_err());
        row.conversion_rate = 0.5;
        row.retention_rate = -0.1;
        assert!(row.check_invariants().is_err());
    }

    #[test]
    fn test_level_users_accessor() {
        let row = sample_affiliate_row();
        assert_eq!(row.level_users(1), 20);
        assert_eq!(row.level_users(3), 2);
        assert_eq!(row.level_users(9), 0);
    }
}
