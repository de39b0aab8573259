//! Target database loading.
//!
//! One transaction per batch. Each record is upserted by the table's
//! external-key column: found rows are updated, missing rows inserted.
//! A unique conflict on insert is classified *skipped* and the batch
//! continues; any other row error rolls the whole batch back.

use std::time::Duration;

use domain::models::TableConfig;
use serde::Serialize;
use shared::value::FieldValue;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EtlError, Result};
use crate::services::transform::MappedRecord;

/// Writer counters for one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadStats {
    pub loaded: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

/// Transactional per-batch upsert into the target database.
#[derive(Clone)]
pub struct TargetWriter {
    pool: PgPool,
    write_timeout: Duration,
}

impl TargetWriter {
    pub fn new(pool: PgPool, write_timeout: Duration) -> Self {
        Self {
            pool,
            write_timeout,
        }
    }

    /// Loads one mapped batch. The transaction commits iff every record was
    /// written or classified skipped.
    pub async fn load_batch(
        &self,
        table: &TableConfig,
        records: &[MappedRecord],
    ) -> Result<LoadStats> {
        if records.is_empty() {
            return Ok(LoadStats::default());
        }
        tokio::time::timeout(self.write_timeout, self.load_batch_inner(table, records))
            .await
            .map_err(|_| EtlError::QueryTimeout(self.write_timeout))?
    }

    async fn load_batch_inner(
        &self,
        table: &TableConfig,
        records: &[MappedRecord],
    ) -> Result<LoadStats> {
        let mut tx = self.pool.begin().await.map_err(EtlError::from)?;
        let mut stats = LoadStats::default();

        for record in records {
            let key_value = record.fields.get(&table.external_key).ok_or_else(|| {
                EtlError::Integrity(format!(
                    "record for '{}' is missing external key '{}'",
                    table.target_table, table.external_key
                ))
            })?;

            let existing = lookup_existing(&mut tx, table, key_value).await?;
            match existing {
                Some(id) => {
                    update_row(&mut tx, table, record, id).await?;
                    stats.updated += 1;
                    stats.loaded += 1;
                }
                None => {
                    let inserted = insert_row(&mut tx, table, record).await?;
                    if inserted.is_some() {
                        stats.inserted += 1;
                        stats.loaded += 1;
                    } else {
                        // ON CONFLICT DO NOTHING returned no id: a unique
                        // constraint already held this row.
                        stats.skipped += 1;
                        debug!(
                            table = %table.target_table,
                            key = %key_value,
                            "insert hit unique conflict; skipped"
                        );
                    }
                }
            }
        }

        tx.commit().await.map_err(EtlError::from)?;
        Ok(stats)
    }
}

async fn lookup_existing(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    table: &TableConfig,
    key_value: &FieldValue,
) -> Result<Option<Uuid>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT id FROM ");
    qb.push(table.target_table.as_str());
    qb.push(" WHERE ");
    qb.push(table.external_key.as_str());
    qb.push(" = ");
    push_bind_field(&mut qb, key_value);

    qb.build_query_scalar::<Uuid>()
        .fetch_optional(&mut **tx)
        .await
        .map_err(EtlError::from)
}

async fn update_row(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    table: &TableConfig,
    record: &MappedRecord,
    id: Uuid,
) -> Result<()> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE ");
    qb.push(table.target_table.as_str());
    qb.push(" SET ");
    for (i, (column, value)) in record.fields.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column.as_str());
        qb.push(" = ");
        push_bind_field(&mut qb, value);
    }
    qb.push(", updated_at = NOW() WHERE id = ");
    qb.push_bind(id);

    qb.build().execute(&mut **tx).await.map_err(EtlError::from)?;
    Ok(())
}

async fn insert_row(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    table: &TableConfig,
    record: &MappedRecord,
) -> Result<Option<Uuid>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO ");
    qb.push(table.target_table.as_str());
    qb.push(" (");
    for (i, column) in record.fields.keys().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column.as_str());
    }
    qb.push(") VALUES (");
    for (i, value) in record.fields.values().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_bind_field(&mut qb, value);
    }
    qb.push(") ON CONFLICT DO NOTHING RETURNING id");

    qb.build_query_scalar::<Uuid>()
        .fetch_optional(&mut **tx)
        .await
        .map_err(EtlError::from)
}

/// Binds a field value with its natural Postgres type.
fn push_bind_field<'args>(qb: &mut QueryBuilder<'args, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Null => {
            qb.push("NULL");
        }
        FieldValue::Bool(b) => {
            qb.push_bind(*b);
        }
        FieldValue::Int(i) => {
            qb.push_bind(*i);
        }
        FieldValue::Float(f) => {
            qb.push_bind(*f);
        }
        FieldValue::Text(s) => {
            qb.push_bind(s.clone());
        }
        FieldValue::Timestamp(ts) => {
            qb.push_bind(*ts);
        }
        FieldValue::Uuid(u) => {
            qb.push_bind(*u);
        }
        FieldValue::Json(v) => {
            qb.push_bind(v.clone());
        }
    }
}
