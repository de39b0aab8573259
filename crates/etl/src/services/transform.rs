//! Record mapping: rename, transform, coerce, validate.
//!
//! Mapping is pure and stateless per row. A transform failure keeps the
//! pre-transform value and records a warning; only validation failures
//! reject a row.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use domain::models::TableConfig;
use domain::services::transforms;
use serde::Serialize;
use shared::validation;
use shared::value::{FieldValue, Row};

/// Provenance attached to every mapped record. Travels on the struct; the
/// writer does not persist it.
#[derive(Debug, Clone, Serialize)]
pub struct EtlMetadata {
    pub source_table: String,
    pub target_table: String,
    pub transformed_at: DateTime<Utc>,
    pub source_id: Option<FieldValue>,
}

/// A row that passed mapping and validation.
#[derive(Debug, Clone)]
pub struct MappedRecord {
    pub fields: Row,
    pub metadata: EtlMetadata,
    /// Target columns expected to be unique; surfaced to the writer.
    pub unique_fields: Vec<String>,
}

/// A row rejected by validation.
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    pub source_row: Row,
    pub errors: Vec<String>,
    pub rejected_at: DateTime<Utc>,
}

/// Mapper counters for one batch.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MapStats {
    pub processed: u64,
    pub transformed: u64,
    pub rejected: u64,
}

impl MapStats {
    /// Share of rows that survived mapping, as a percentage rounded to two
    /// decimals. An empty input maps with a 100.00 success rate.
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 100.0;
        }
        let rate = self.transformed as f64 * 100.0 / self.processed as f64;
        (rate * 100.0).round() / 100.0
    }
}

/// Result of mapping one batch.
#[derive(Debug, Default)]
pub struct MapOutcome {
    pub records: Vec<MappedRecord>,
    pub rejected: Vec<RejectedRecord>,
    pub stats: MapStats,
    pub warnings: Vec<String>,
}

/// Pure per-row transformation stage.
pub struct RecordMapper;

impl RecordMapper {
    /// Maps a batch of extracted rows through the table's rules.
    pub fn map_batch(table: &TableConfig, rows: Vec<Row>) -> MapOutcome {
        let mut outcome = MapOutcome::default();
        for row in rows {
            outcome.stats.processed += 1;
            match Self::map_row(table, &row, &mut outcome.warnings) {
                Ok(record) => {
                    outcome.stats.transformed += 1;
                    outcome.records.push(record);
                }
                Err(errors) => {
                    outcome.stats.rejected += 1;
                    outcome.rejected.push(RejectedRecord {
                        source_row: row,
                        errors,
                        rejected_at: Utc::now(),
                    });
                }
            }
        }
        outcome
    }

    /// Maps a single row. Returns the validation errors on rejection.
    pub fn map_row(
        table: &TableConfig,
        source_row: &Row,
        warnings: &mut Vec<String>,
    ) -> Result<MappedRecord, Vec<String>> {
        // 1. Rename: project through the field mapping; unmapped source
        //    columns are dropped.
        let mut fields = Row::with_capacity(table.field_mapping.len());
        for (source_column, target_column) in &table.field_mapping {
            if let Some(value) = source_row.get(source_column) {
                fields.insert(target_column.clone(), value.clone());
            }
        }

        // 2. Per-field transforms.
        for (target_column, transform_name) in &table.transformations {
            let Some(current) = fields.get(target_column).cloned() else {
                continue;
            };
            match transforms::apply(transform_name, &current, source_row) {
                Ok(next) => {
                    fields.insert(target_column.clone(), next);
                }
                Err(err) => {
                    warnings.push(format!(
                        "transform '{}' on '{}.{}' failed: {} (value kept)",
                        transform_name, table.source_table, target_column, err
                    ));
                }
            }
        }

        // 3. Default coercions.
        let columns: Vec<String> = fields.keys().cloned().collect();
        for column in &columns {
            let Some(value) = fields.get(column).cloned() else {
                continue;
            };
            let coerced = coerce_value(column, value, warnings);
            fields.insert(column.clone(), coerced);
        }

        // 4. Validation.
        let errors = validate(table, &fields);
        if !errors.is_empty() {
            return Err(errors);
        }

        // 5. Metadata.
        let metadata = EtlMetadata {
            source_table: table.source_table.clone(),
            target_table: table.target_table.clone(),
            transformed_at: Utc::now(),
            source_id: source_row.get(&table.primary_key).cloned(),
        };

        Ok(MappedRecord {
            fields,
            metadata,
            unique_fields: table.validations.unique.clone(),
        })
    }
}

/// Name-driven default coercions, applied after per-field transforms.
fn coerce_value(column: &str, value: FieldValue, warnings: &mut Vec<String>) -> FieldValue {
    // Trim text; empty text becomes NULL.
    let value = match value {
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return FieldValue::Null;
            }
            FieldValue::Text(trimmed.to_string())
        }
        other => other,
    };

    if is_timestamp_column(column) {
        return match value {
            FieldValue::Timestamp(ts) => FieldValue::Timestamp(ts),
            FieldValue::Text(s) => match parse_timestamp(&s) {
                Some(ts) => FieldValue::Timestamp(ts),
                None => {
                    warnings.push(format!(
                        "column '{}' holds unparseable timestamp '{}' (set to null)",
                        column, s
                    ));
                    FieldValue::Null
                }
            },
            other => other,
        };
    }

    if is_numeric_column(column) {
        return match value {
            FieldValue::Text(s) => {
                if let Ok(i) = s.parse::<i64>() {
                    FieldValue::Int(i)
                } else if let Ok(f) = s.parse::<f64>() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Text(s)
                }
            }
            other => other,
        };
    }

    if let FieldValue::Text(s) = &value {
        if s.eq_ignore_ascii_case("true") {
            return FieldValue::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return FieldValue::Bool(false);
        }
    }

    value
}

fn is_timestamp_column(column: &str) -> bool {
    column.ends_with("_at") || column.ends_with("_date") || column.starts_with("date_")
}

fn is_numeric_column(column: &str) -> bool {
    column == "id" || column.ends_with("_id") || column.contains("amount")
}

/// Accepts RFC 3339 plus the common date and datetime layouts seen in
/// operational exports.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    None
}

fn validate(table: &TableConfig, fields: &Row) -> Vec<String> {
    let mut errors = Vec::new();
    let rules = &table.validations;

    for column in &rules.required {
        let missing = fields.get(column).map(|v| v.is_empty()).unwrap_or(true);
        if missing {
            errors.push(format!("required field '{}' is missing or empty", column));
        }
    }

    if let Some(column) = &rules.email {
        if let Some(value) = fields.get(column) {
            if !value.is_empty() {
                let valid = value
                    .as_str()
                    .map(validation::is_valid_email)
                    .unwrap_or(false);
                if !valid {
                    errors.push(format!("field '{}' is not a valid email address", column));
                }
            }
        }
    }

    for column in &rules.numeric {
        if let Some(value) = fields.get(column) {
            if !value.is_empty() && !validation::is_numeric(value) {
                errors.push(format!("field '{}' is not numeric", column));
            }
        }
    }

    for column in &rules.positive {
        if let Some(value) = fields.get(column) {
            if !value.is_empty() && !validation::is_positive(value) {
                errors.push(format!("field '{}' must be greater than zero", column));
            }
        }
    }

    errors
}
