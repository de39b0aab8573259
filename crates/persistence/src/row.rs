//! Dynamic row decoding for schema-driven extraction.
//!
//! The extractor reads tables whose columns are known only from
//! configuration, so rows are decoded by inspecting each column's Postgres
//! type at runtime instead of through `FromRow`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use shared::value::{FieldValue, Row};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use uuid::Uuid;

/// Decodes a dynamically-shaped Postgres row into an ordered value map.
///
/// Unsupported column types decode as text when possible and as `Null`
/// otherwise; decoding never fails the batch.
pub fn decode_row(row: &PgRow) -> Row {
    let mut out = Row::with_capacity(row.columns().len());
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> FieldValue {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return FieldValue::Null,
        Ok(_) => {}
        Err(_) => return FieldValue::Null,
    }

    match type_name {
        "INT2" => row
            .try_get::<i16, _>(idx)
            .map(|v| FieldValue::Int(v as i64))
            .unwrap_or(FieldValue::Null),
        "INT4" => row
            .try_get::<i32, _>(idx)
            .map(|v| FieldValue::Int(v as i64))
            .unwrap_or(FieldValue::Null),
        "INT8" => row
            .try_get::<i64, _>(idx)
            .map(FieldValue::Int)
            .unwrap_or(FieldValue::Null),
        "FLOAT4" => row
            .try_get::<f32, _>(idx)
            .map(|v| FieldValue::Float(v as f64))
            .unwrap_or(FieldValue::Null),
        "FLOAT8" => row
            .try_get::<f64, _>(idx)
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Null),
        "NUMERIC" => row
            .try_get::<Decimal, _>(idx)
            .ok()
            .and_then(|d| d.to_f64())
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Null),
        "BOOL" => row
            .try_get::<bool, _>(idx)
            .map(FieldValue::Bool)
            .unwrap_or(FieldValue::Null),
        "UUID" => row
            .try_get::<Uuid, _>(idx)
            .map(FieldValue::Uuid)
            .unwrap_or(FieldValue::Null),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(FieldValue::Timestamp)
            .unwrap_or(FieldValue::Null),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|naive| FieldValue::Timestamp(Utc.from_utc_datetime(&naive)))
            .unwrap_or(FieldValue::Null),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| FieldValue::Timestamp(Utc.from_utc_datetime(&naive)))
            .unwrap_or(FieldValue::Null),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(idx)
            .map(FieldValue::Json)
            .unwrap_or(FieldValue::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(FieldValue::Text)
            .unwrap_or(FieldValue::Null),
    }
}
