//! CPA qualification evaluation.

use crate::models::cpa::{CpaCriterion, CpaCriterionType, CpaValidationRules, RuleOperator};

/// The activity metrics a qualification decision is made from.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpaMetrics {
    pub total_deposits: f64,
    pub bet_count: i64,
    pub total_bets: f64,
    pub days_active: i64,
}

/// Evaluates the configured rule set against a user's period metrics.
///
/// Disabled criteria are skipped. A group with no enabled criteria passes.
pub fn evaluate(rules: &CpaValidationRules, metrics: &CpaMetrics) -> bool {
    if rules.groups.is_empty() {
        return false;
    }
    let mut group_results = rules
        .groups
        .iter()
        .map(|group| {
            let enabled: Vec<&CpaCriterion> =
                group.criteria.iter().filter(|c| c.enabled).collect();
            if enabled.is_empty() {
                return true;
            }
            match group.operator {
                RuleOperator::And => enabled.iter().all(|c| criterion_met(c, metrics)),
                RuleOperator::Or => enabled.iter().any(|c| criterion_met(c, metrics)),
            }
        });
    match rules.group_operator {
        RuleOperator::And => group_results.all(|passed| passed),
        RuleOperator::Or => group_results.any(|passed| passed),
    }
}

fn criterion_met(criterion: &CpaCriterion, metrics: &CpaMetrics) -> bool {
    let observed = match criterion.criterion_type {
        CpaCriterionType::TotalDeposits => metrics.total_deposits,
        CpaCriterionType::BetCount => metrics.bet_count as f64,
        CpaCriterionType::TotalBets => metrics.total_bets,
        CpaCriterionType::DaysActive => metrics.days_active as f64,
    };
    observed >= criterion.value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cpa::CpaCriteriaGroup;

    fn qualified_metrics() -> CpaMetrics {
        CpaMetrics {
            total_deposits: 50.0,
            bet_count: 12,
            total_bets: 200.0,
            days_active: 4,
        }
    }

    #[test]
    fn test_default_rules_qualify() {
        let rules = CpaValidationRules::default();
        assert!(evaluate(&rules, &qualified_metrics()));
    }

    #[test]
    fn test_default_rules_reject_below_threshold() {
        let rules = CpaValidationRules::default();
        let mut metrics = qualified_metrics();
        metrics.total_deposits = 29.99;
        assert!(!evaluate(&rules, &metrics));

        let mut metrics = qualified_metrics();
        metrics.days_active = 2;
        assert!(!evaluate(&rules, &metrics));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let rules = CpaValidationRules::default();
        let metrics = CpaMetrics {
            total_deposits: 30.0,
            bet_count: 10,
            total_bets: 100.0,
            days_active: 3,
        };
        assert!(evaluate(&rules, &metrics));
    }

    #[test]
    fn test_or_group() {
        let rules = CpaValidationRules {
            groups: vec![CpaCriteriaGroup {
                operator: RuleOperator::Or,
                criteria: vec![
                    CpaCriterion {
                        criterion_type: CpaCriterionType::TotalDeposits,
                        value: 1000.0,
                        enabled: true,
                    },
                    CpaCriterion {
                        criterion_type: CpaCriterionType::DaysActive,
                        value: 3.0,
                        enabled: true,
                    },
                ],
            }],
            group_operator: RuleOperator::And,
        };
        assert!(evaluate(&rules, &qualified_metrics()));
    }

    #[test]
    fn test_disabled_criteria_are_skipped() {
        let rules = CpaValidationRules {
            groups: vec![CpaCriteriaGroup {
                operator: RuleOperator::And,
                criteria: vec![
                    CpaCriterion {
                        criterion_type: CpaCriterionType::TotalDeposits,
                        value: 1_000_000.0,
                        enabled: false,
                    },
                    CpaCriterion {
                        criterion_type: CpaCriterionType::BetCount,
                        value: 1.0,
                        enabled: true,
                    },
                ],
            }],
            group_operator: RuleOperator::And,
        };
        assert!(evaluate(&rules, &qualified_metrics()));
    }

    #[test]
    fn test_empty_rule_set_never_qualifies() {
        let rules = CpaValidationRules {
            groups: vec![],
            group_operator: RuleOperator::And,
        };
        assert!(!evaluate(&rules, &qualified_metrics()));
    }

    #[test]
    fn test_or_of_groups() {
        let failing = CpaCriteriaGroup {
            operator: RuleOperator::And,
            criteria: vec![CpaCriterion {
                criterion_type: CpaCriterionType::TotalBets,
                value: 1_000_000.0,
                enabled: true,
            }],
        };
        let passing = CpaCriteriaGroup {
            operator: RuleOperator::And,
            criteria: vec![CpaCriterion {
                criterion_type: CpaCriterionType::BetCount,
                value: 1.0,
                enabled: true,
            }],
        };
        let rules = CpaValidationRules {
            groups: vec![failing, passing],
            group_operator: RuleOperator::Or,
        };
        assert!(evaluate(&rules, &qualified_metrics()));
    }
}
