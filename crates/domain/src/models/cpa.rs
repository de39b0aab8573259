//! CPA payout and qualification rule models.

use serde::{Deserialize, Serialize};

/// `cpa_level_amounts` configuration key: payout per downline level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpaLevelAmounts {
    #[serde(default = "default_level_1")]
    pub level_1: f64,
    #[serde(default = "default_level_2")]
    pub level_2: f64,
    #[serde(default = "default_level_other")]
    pub level_3: f64,
    #[serde(default = "default_level_other")]
    pub level_4: f64,
    #[serde(default = "default_level_other")]
    pub level_5: f64,
}

impl CpaLevelAmounts {
    pub fn for_level(&self, level: u8) -> f64 {
        match level {
            1 => self.level_1,
            2 => self.level_2,
            3 => self.level_3,
            4 => self.level_4,
            5 => self.level_5,
            _ => 0.0,
        }
    }
}

impl Default for CpaLevelAmounts {
    fn default() -> Self {
        Self {
            level_1: default_level_1(),
            level_2: default_level_2(),
            level_3: default_level_other(),
            level_4: default_level_other(),
            level_5: default_level_other(),
        }
    }
}

fn default_level_1() -> f64 {
    50.0
}
fn default_level_2() -> f64 {
    20.0
}
fn default_level_other() -> f64 {
    5.0
}

/// How criteria within a group, or groups within the rule set, combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleOperator {
    #[default]
    And,
    Or,
}

/// The metric a criterion compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpaCriterionType {
    TotalDeposits,
    BetCount,
    TotalBets,
    DaysActive,
}

/// A single qualification threshold: metric >= value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpaCriterion {
    #[serde(rename = "type")]
    pub criterion_type: CpaCriterionType,
    pub value: f64,
    #[serde(default = "default_criterion_enabled")]
    pub enabled: bool,
}

fn default_criterion_enabled() -> bool {
    true
}

/// A group of criteria combined with one operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpaCriteriaGroup {
    #[serde(default)]
    pub operator: RuleOperator,
    pub criteria: Vec<CpaCriterion>,
}

/// `cpa_validation_rules` configuration key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpaValidationRules {
    pub groups: Vec<CpaCriteriaGroup>,
    #[serde(default)]
    pub group_operator: RuleOperator,
}

impl Default for CpaValidationRules {
    fn default() -> Self {
        Self {
            groups: vec![CpaCriteriaGroup {
                operator: RuleOperator::And,
                criteria: vec![
                    CpaCriterion {
                        criterion_type: CpaCriterionType::TotalDeposits,
                        value: 30.0,
                        enabled: true,
                    },
                    CpaCriterion {
                        criterion_type: CpaCriterionType::BetCount,
                        value: 10.0,
                        enabled: true,
                    },
                    CpaCriterion {
                        criterion_type: CpaCriterionType::TotalBets,
                        value: 100.0,
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
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_amounts() {
        let amounts = CpaLevelAmounts::default();
        assert_eq!(amounts.level_1, 50.0);
        assert_eq!(amounts.level_2, 20.0);
        assert_eq!(amounts.level_3, 5.0);
        assert_eq!(amounts.for_level(1), 50.0);
        assert_eq!(amounts.for_level(5), 5.0);
        assert_eq!(amounts.for_level(6), 0.0);
    }

    #[test]
    fn test_default_rules_shape() {
        let rules = CpaValidationRules::default();
        assert_eq!(rules.groups.len(), 1);
        assert_eq!(rules.groups[0].criteria.len(), 4);
        assert_eq!(rules.group_operator, RuleOperator::And);
    }

    #[test]
    fn test_rules_deserialize() {
        let json = r#"{
            "groups": [
                {"operator": "OR", "criteria": [
                    {"type": "total_deposits", "value": 30},
                    {"type": "days_active", "value": 3, "enabled": false}
                ]}
            ],
            "group_operator": "AND"
        }"#;
        let rules: CpaValidationRules = serde_json::from_str(json).unwrap();
        assert_eq!(rules.groups[0].operator, RuleOperator::Or);
        assert!(rules.groups[0].criteria[0].enabled);
        assert!(!rules.groups[0].criteria[1].enabled);
        assert_eq!(
            rules.groups[0].criteria[0].criterion_type,
            CpaCriterionType::TotalDeposits
        );
    }
}
