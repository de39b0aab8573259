//! Syncable table descriptors.
//!
//! A [`TableConfig`] is the unit of ETL configuration: it names the source
//! and target tables, the upsert key, the incremental watermark column, and
//! the mapping/transform/filter/validation rules applied to every row.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single filter predicate value for the source query.
///
/// Scalars compare with `=`, lists with `IN`, and operator maps apply one
/// comparison per entry. All values are bound as query parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<serde_json::Value>),
    Ops(IndexMap<FilterOp, serde_json::Value>),
    Scalar(serde_json::Value),
}

/// Comparison operators accepted in filter maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    /// SQL rendering of the operator.
    pub fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

/// Per-table validation rule set, checked by the record mapper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Columns that must be present and non-empty.
    #[serde(default)]
    pub required: Vec<String>,

    /// Column holding an email address.
    #[serde(default)]
    pub email: Option<String>,

    /// Columns that must hold numeric values.
    #[serde(default)]
    pub numeric: Vec<String>,

    /// Columns that must hold values strictly greater than zero.
    #[serde(default)]
    pub positive: Vec<String>,

    /// Columns expected to be unique on the target; surfaced to the writer,
    /// not checked by the mapper.
    #[serde(default)]
    pub unique: Vec<String>,
}

/// Configuration for one syncable table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table read from the source database.
    pub source_table: String,

    /// Table written on the target database.
    pub target_table: String,

    /// Source primary-key column; also the full-sync pagination order.
    pub primary_key: String,

    /// Target column carrying the source primary key; upsert lookup key.
    pub external_key: String,

    /// Source column driving incremental sync. Absent means the table
    /// supports full sync only.
    #[serde(default)]
    pub incremental_field: Option<String>,

    /// Disabled tables are skipped by every scheduled and manual sync.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Source column to target column projection; unmapped source columns
    /// are dropped.
    pub field_mapping: IndexMap<String, String>,

    /// Target column to registered transform name.
    #[serde(default)]
    pub transformations: IndexMap<String, String>,

    /// Source-side filter predicates.
    #[serde(default)]
    pub filters: IndexMap<String, FilterValue>,

    /// Validation rules applied after mapping.
    #[serde(default)]
    pub validations: ValidationRules,
}

fn default_enabled() -> bool {
    true
}

impl TableConfig {
    /// True when the table can run in incremental mode.
    pub fn supports_incremental(&self) -> bool {
        self.incremental_field.is_some()
    }
}

/// The set of configured tables, in sync order.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: IndexMap<String, TableConfig>,
}

impl TableRegistry {
    pub fn new(tables: Vec<TableConfig>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.source_table.clone(), t))
                .collect(),
        }
    }

    /// The built-in descriptors for the operational tables.
    pub fn builtin() -> Self {
        Self::new(builtin_tables())
    }

    pub fn get(&self, source_table: &str) -> Option<&TableConfig> {
        self.tables.get(source_table)
    }

    /// Enabled tables, in configuration order.
    pub fn enabled(&self) -> impl Iterator<Item = &TableConfig> {
        self.tables.values().filter(|t| t.enabled)
    }

    /// Enabled tables that declare an incremental field.
    pub fn incremental(&self) -> impl Iterator<Item = &TableConfig> {
        self.enabled().filter(|t| t.supports_incremental())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Restrict the registry to the named tables, keeping builtin order.
    pub fn retain(&mut self, names: &[String]) {
        self.tables.retain(|name, _| names.iter().any(|n| n == name));
    }
}

fn builtin_tables() -> Vec<TableConfig> {
    use serde_json::json;

    vec![
        TableConfig {
            source_table: "users".into(),
            target_table: "affiliates".into(),
            primary_key: "id".into(),
            external_key: "external_user_id".into(),
            incremental_field: Some("updated_at".into()),
            enabled: true,
            field_mapping: IndexMap::from([
                ("id".to_string(), "external_user_id".to_string()),
                ("name".to_string(), "name".to_string()),
                ("email".to_string(), "email".to_string()),
                ("phone".to_string(), "phone".to_string()),
                ("status".to_string(), "status".to_string()),
                ("referrer_id".to_string(), "referred_by_external_id".to_string()),
                ("created_at".to_string(), "registered_at".to_string()),
            ]),
            transformations: IndexMap::from([
                ("email".to_string(), "normalize_email".to_string()),
                ("phone".to_string(), "clean_phone".to_string()),
                ("status".to_string(), "map_user_status".to_string()),
            ]),
            filters: IndexMap::from([(
                "status".to_string(),
                FilterValue::Ops(IndexMap::from([(FilterOp::Ne, json!("deleted"))])),
            )]),
            validations: ValidationRules {
                required: vec!["external_user_id".into(), "email".into()],
                email: Some("email".into()),
                numeric: vec!["external_user_id".into()],
                positive: vec![],
                unique: vec!["external_user_id".into()],
            },
        },
        TableConfig {
            source_table: "transactions".into(),
            target_table: "referrals".into(),
            primary_key: "id".into(),
            external_key: "external_transaction_id".into(),
            incremental_field: Some("created_at".into()),
            enabled: true,
            field_mapping: IndexMap::from([
                ("id".to_string(), "external_transaction_id".to_string()),
                ("user_id".to_string(), "external_user_id".to_string()),
                ("amount".to_string(), "amount".to_string()),
                ("type".to_string(), "transaction_type".to_string()),
                ("status".to_string(), "status".to_string()),
                ("created_at".to_string(), "transacted_at".to_string()),
            ]),
            transformations: IndexMap::from([(
                "amount".to_string(),
                "parse_amount".to_string(),
            )]),
            filters: IndexMap::from([(
                "status".to_string(),
                FilterValue::List(vec![json!("completed"), json!("confirmed")]),
            )]),
            validations: ValidationRules {
                required: vec![
                    "external_transaction_id".into(),
                    "external_user_id".into(),
                ],
                email: None,
                numeric: vec!["amount".into()],
                positive: vec!["amount".into()],
                unique: vec!["external_transaction_id".into()],
            },
        },
        TableConfig {
            source_table: "bets".into(),
            target_table: "bet_activities".into(),
            primary_key: "id".into(),
            external_key: "external_bet_id".into(),
            incremental_field: Some("updated_at".into()),
            enabled: true,
            field_mapping: IndexMap::from([
                ("id".to_string(), "external_bet_id".to_string()),
                ("user_id".to_string(), "external_user_id".to_string()),
                ("amount".to_string(), "amount".to_string()),
                ("win_amount".to_string(), "win_amount".to_string()),
                ("result".to_string(), "result".to_string()),
                ("game".to_string(), "game".to_string()),
                ("created_at".to_string(), "placed_at".to_string()),
            ]),
            transformations: IndexMap::from([
                ("amount".to_string(), "parse_amount".to_string()),
                ("win_amount".to_string(), "parse_amount".to_string()),
                ("result".to_string(), "map_bet_result".to_string()),
            ]),
            filters: IndexMap::new(),
            validations: ValidationRules {
                required: vec!["external_bet_id".into(), "external_user_id".into()],
                email: None,
                numeric: vec!["amount".into()],
                positive: vec!["amount".into()],
                unique: vec!["external_bet_id".into()],
            },
        },
        TableConfig {
            source_table: "deposits".into(),
            target_table: "deposit_records".into(),
            primary_key: "id".into(),
            external_key: "external_deposit_id".into(),
            incremental_field: Some("created_at".into()),
            enabled: true,
            field_mapping: IndexMap::from([
                ("id".to_string(), "external_deposit_id".to_string()),
                ("user_id".to_string(), "external_user_id".to_string()),
                ("amount".to_string(), "amount".to_string()),
                ("method".to_string(), "payment_method".to_string()),
                ("status".to_string(), "status".to_string()),
                ("created_at".to_string(), "deposited_at".to_string()),
            ]),
            transformations: IndexMap::from([(
                "amount".to_string(),
                "parse_amount".to_string(),
            )]),
            filters: IndexMap::from([("status".to_string(), FilterValue::Scalar(json!("paid")))]),
            validations: ValidationRules {
                required: vec!["external_deposit_id".into(), "external_user_id".into()],
                email: None,
                numeric: vec!["amount".into()],
                positive: vec!["amount".into()],
                unique: vec!["external_deposit_id".into()],
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_shape() {
        let registry = TableRegistry::builtin();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.enabled().count(), 4);
        assert_eq!(registry.incremental().count(), 4);
    }

    #[test]
    fn test_users_descriptor() {
        let registry = TableRegistry::builtin();
        let users = registry.get("users").unwrap();
        assert_eq!(users.target_table, "affiliates");
        assert_eq!(users.external_key, "external_user_id");
        assert_eq!(users.incremental_field.as_deref(), Some("updated_at"));
        assert_eq!(
            users.field_mapping.get("id").map(String::as_str),
            Some("external_user_id")
        );
        assert_eq!(users.validations.email.as_deref(), Some("email"));
        assert!(users.validations.unique.contains(&"external_user_id".to_string()));
    }

    #[test]
    fn test_filter_value_deserialize_scalar() {
        let v: FilterValue = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(v, FilterValue::Scalar(serde_json::json!("paid")));
    }

    #[test]
    fn test_filter_value_deserialize_list() {
        let v: FilterValue = serde_json::from_str(r#"["completed","confirmed"]"#).unwrap();
        match v {
            FilterValue::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_value_deserialize_ops() {
        let v: FilterValue = serde_json::from_str(r#"{"gte": 100, "lt": 500}"#).unwrap();
        match v {
            FilterValue::Ops(ops) => {
                assert_eq!(ops.get(&FilterOp::Gte), Some(&serde_json::json!(100)));
                assert_eq!(ops.get(&FilterOp::Lt), Some(&serde_json::json!(500)));
            }
            other => panic!("expected ops, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_op_sql() {
        assert_eq!(FilterOp::Eq.sql(), "=");
        assert_eq!(FilterOp::Ne.sql(), "<>");
        assert_eq!(FilterOp::Gte.sql(), ">=");
        assert_eq!(FilterOp::Lte.sql(), "<=");
    }

    #[test]
    fn test_registry_retain() {
        let mut registry = TableRegistry::builtin();
        registry.retain(&["users".to_string(), "bets".to_string()]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("transactions").is_none());
    }

    #[test]
    fn test_table_config_roundtrip() {
        let registry = TableRegistry::builtin();
        let users = registry.get("users").unwrap();
        let json = serde_json::to_string(users).unwrap();
        let back: TableConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source_table, "users");
        assert_eq!(back.filters.len(), 1);
        assert!(back.enabled);
    }
}
