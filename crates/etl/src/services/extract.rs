//! Source database extraction.
//!
//! Queries are composed from table descriptors with `QueryBuilder`; every
//! filter and watermark value is a bound parameter. Identifiers (table and
//! column names) come only from trusted configuration.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::models::{FilterValue, TableConfig};
use indexmap::IndexMap;
use persistence::row::decode_row;
use shared::value::Row;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::warn;

use crate::error::{EtlError, Result};

/// A bounded time window on a named timestamp column.
#[derive(Debug, Clone)]
pub struct TimeWindow {
    pub column: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Options for one batch read.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub batch_size: i64,
    pub offset: i64,

    /// Watermark for incremental reads; applied as
    /// `incremental_field > watermark`. Ignored for tables without an
    /// incremental field unless `incremental_field` below overrides it.
    pub watermark: Option<DateTime<Utc>>,

    /// Overrides the table's incremental column for this read.
    pub incremental_field: Option<String>,

    /// Additional filters merged over the table's configured ones.
    pub extra_filters: IndexMap<String, FilterValue>,

    /// Bounded time window, used by the analytics engine.
    pub window: Option<TimeWindow>,

    /// Overrides the default ordering column.
    pub order_by: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            offset: 0,
            watermark: None,
            incremental_field: None,
            extra_filters: IndexMap::new(),
            window: None,
            order_by: None,
        }
    }
}

/// One page of extracted rows.
#[derive(Debug)]
pub struct BatchResult {
    pub rows: Vec<Row>,
    pub has_more: bool,
}

/// Streams rows out of the source database.
#[derive(Clone)]
pub struct SourceReader {
    pool: PgPool,
    max_retries: u32,
    retry_delay: Duration,
    query_timeout: Duration,
}

impl SourceReader {
    pub fn new(
        pool: PgPool,
        max_retries: u32,
        retry_delay: Duration,
        query_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            max_retries,
            retry_delay,
            query_timeout,
        }
    }

    /// Reads one batch. A page of exactly `batch_size` rows reports
    /// `has_more = true`; a short page reports `false`.
    pub async fn read_batch(
        &self,
        table: &TableConfig,
        opts: &ReadOptions,
    ) -> Result<BatchResult> {
        let incremental_column = opts
            .incremental_field
            .clone()
            .or_else(|| table.incremental_field.clone());
        let incremental = match (incremental_column, opts.watermark) {
            (Some(column), Some(watermark)) => Some((column, watermark)),
            _ => None,
        };

        // Incremental reads page by the watermark column; full reads page by
        // the primary key, keeping LIMIT/OFFSET pagination monotonic.
        let order_by = opts.order_by.clone().unwrap_or_else(|| {
            incremental
                .as_ref()
                .map(|(column, _)| column.clone())
                .unwrap_or_else(|| table.primary_key.clone())
        });

        let rows = self
            .query_rows(
                &table.source_table,
                &table.filters,
                &opts.extra_filters,
                incremental.as_ref(),
                opts.window.as_ref(),
                &order_by,
                opts.batch_size,
                opts.offset,
            )
            .await?;

        let has_more = rows.len() as i64 == opts.batch_size;
        Ok(BatchResult { rows, has_more })
    }

    /// Drives `read_batch` with a growing offset until a short page returns,
    /// invoking the callback for every non-empty batch. Returns the total
    /// number of rows streamed.
    pub async fn read_all<F, Fut>(
        &self,
        table: &TableConfig,
        opts: &ReadOptions,
        mut on_batch: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<Row>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut offset = opts.offset;
        let mut total: u64 = 0;
        loop {
            let batch_opts = ReadOptions {
                offset,
                ..opts.clone()
            };
            let batch = self.read_batch(table, &batch_opts).await?;
            let count = batch.rows.len() as u64;
            total += count;
            if count > 0 {
                on_batch(batch.rows).await?;
            }
            if !batch.has_more {
                break;
            }
            offset += opts.batch_size;
        }
        Ok(total)
    }

    /// Raw row fetch for the analytics engine: same composition rules as
    /// `read_batch`, addressed by table name instead of descriptor.
    pub async fn fetch_rows(
        &self,
        table_name: &str,
        filters: &IndexMap<String, FilterValue>,
        window: Option<&TimeWindow>,
        order_by: &str,
        limit: i64,
    ) -> Result<Vec<Row>> {
        self.query_rows(
            table_name,
            filters,
            &IndexMap::new(),
            None,
            window,
            order_by,
            limit,
            0,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn query_rows(
        &self,
        table_name: &str,
        filters: &IndexMap<String, FilterValue>,
        extra_filters: &IndexMap<String, FilterValue>,
        incremental: Option<&(String, DateTime<Utc>)>,
        window: Option<&TimeWindow>,
        order_by: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Row>> {
        let mut builder = build_select(
            table_name,
            filters,
            extra_filters,
            incremental,
            window,
            order_by,
            limit,
            offset,
        );

        let mut conn = self.acquire_with_retry().await?;
        let query = builder.build();
        let rows = tokio::time::timeout(self.query_timeout, query.fetch_all(&mut *conn))
            .await
            .map_err(|_| EtlError::QueryTimeout(self.query_timeout))?
            .map_err(EtlError::from)?;

        Ok(rows.iter().map(decode_row).collect())
    }

    async fn acquire_with_retry(
        &self,
    ) -> Result<sqlx::pool::PoolConnection<Postgres>> {
        let mut attempt: u32 = 0;
        loop {
            match self.pool.acquire().await {
                Ok(conn) => return Ok(conn),
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "source connection acquisition failed; retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(EtlError::from(err)),
            }
        }
    }
}

/// Composes the batch SELECT. Split out for testability.
#[allow(clippy::too_many_arguments)]
fn build_select<'args>(
    table_name: &str,
    filters: &'args IndexMap<String, FilterValue>,
    extra_filters: &'args IndexMap<String, FilterValue>,
    incremental: Option<&'args (String, DateTime<Utc>)>,
    window: Option<&'args TimeWindow>,
    order_by: &str,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'args, Postgres> {
    let mut qb: QueryBuilder<'args, Postgres> = QueryBuilder::new("SELECT * FROM ");
    qb.push(table_name);

    let mut has_where = false;
    let push_clause = |qb: &mut QueryBuilder<'args, Postgres>, has_where: &mut bool| {
        if *has_where {
            qb.push(" AND ");
        } else {
            qb.push(" WHERE ");
            *has_where = true;
        }
    };

    for (column, filter) in filters.iter().chain(extra_filters.iter()) {
        match filter {
            FilterValue::Scalar(value) => {
                push_clause(&mut qb, &mut has_where);
                qb.push(column.as_str());
                qb.push(" = ");
                push_bind_json(&mut qb, value);
            }
            FilterValue::List(values) if values.is_empty() => {
                // An empty IN list matches nothing.
                push_clause(&mut qb, &mut has_where);
                qb.push("FALSE");
            }
            FilterValue::List(values) => {
                push_clause(&mut qb, &mut has_where);
                qb.push(column.as_str());
                qb.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_bind_json(&mut qb, value);
                }
                qb.push(")");
            }
            FilterValue::Ops(ops) => {
                for (op, value) in ops {
                    push_clause(&mut qb, &mut has_where);
                    qb.push(column.as_str());
                    qb.push(" ");
                    qb.push(op.sql());
                    qb.push(" ");
                    push_bind_json(&mut qb, value);
                }
            }
        }
    }

    if let Some((column, watermark)) = incremental {
        push_clause(&mut qb, &mut has_where);
        qb.push(column.as_str());
        qb.push(" > ");
        qb.push_bind(*watermark);
    }

    if let Some(window) = window {
        push_clause(&mut qb, &mut has_where);
        qb.push(window.column.as_str());
        qb.push(" >= ");
        qb.push_bind(window.from);
        push_clause(&mut qb, &mut has_where);
        qb.push(window.column.as_str());
        qb.push(" <= ");
        qb.push_bind(window.to);
    }

    qb.push(" ORDER BY ");
    qb.push(order_by);
    qb.push(" ASC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    qb
}

/// Binds a JSON filter value with its natural Postgres type.
fn push_bind_json<'args>(qb: &mut QueryBuilder<'args, Postgres>, value: &serde_json::Value) {
    match value {
        serde_json::Value::Null => {
            qb.push("NULL");
        }
        serde_json::Value::Bool(b) => {
            qb.push_bind(*b);
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else if let Some(f) = n.as_f64() {
                qb.push_bind(f);
            } else {
                qb.push("NULL");
            }
        }
        serde_json::Value::String(s) => {
            qb.push_bind(s.clone());
        }
        other => {
            qb.push_bind(other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::models::{FilterOp, TableRegistry};
    use serde_json::json;

    fn users_table() -> TableConfig {
        TableRegistry::builtin().get("users").cloned().unwrap()
    }

    #[test]
    fn test_build_select_scalar_filter() {
        let filters = IndexMap::from([(
            "status".to_string(),
            FilterValue::Scalar(json!("paid")),
        )]);
        let extra = IndexMap::new();
        let qb = build_select("deposits", &filters, &extra, None, None, "id", 100, 0);
        let sql = qb.sql();
        assert!(sql.starts_with("SELECT * FROM deposits WHERE status = $1"));
        assert!(sql.contains("ORDER BY id ASC LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn test_build_select_list_filter() {
        let filters = IndexMap::from([(
            "status".to_string(),
            FilterValue::List(vec![json!("completed"), json!("confirmed")]),
        )]);
        let extra = IndexMap::new();
        let qb = build_select("transactions", &filters, &extra, None, None, "id", 50, 0);
        let sql = qb.sql();
        assert!(sql.contains("status IN ($1, $2)"));
    }

    #[test]
    fn test_build_select_empty_list_matches_nothing() {
        let filters = IndexMap::from([("status".to_string(), FilterValue::List(vec![]))]);
        let extra = IndexMap::new();
        let qb = build_select("transactions", &filters, &extra, None, None, "id", 50, 0);
        assert!(qb.sql().contains("WHERE FALSE"));
    }

    #[test]
    fn test_build_select_ops_filter() {
        let filters = IndexMap::from([(
            "amount".to_string(),
            FilterValue::Ops(IndexMap::from([
                (FilterOp::Gte, json!(100)),
                (FilterOp::Lt, json!(500)),
            ])),
        )]);
        let extra = IndexMap::new();
        let qb = build_select("deposits", &filters, &extra, None, None, "id", 10, 0);
        let sql = qb.sql();
        assert!(sql.contains("amount >= $1"));
        assert!(sql.contains("amount < $2"));
    }

    #[test]
    fn test_build_select_incremental_predicate_and_ordering() {
        let watermark = Utc.with_ymd_and_hms(2025, 3, 10, 10, 3, 0).unwrap();
        let incremental = ("updated_at".to_string(), watermark);
        let filters = IndexMap::new();
        let extra = IndexMap::new();
        let qb = build_select(
            "users",
            &filters,
            &extra,
            Some(&incremental),
            None,
            "updated_at",
            10,
            0,
        );
        let sql = qb.sql();
        assert!(sql.contains("updated_at > $1"));
        assert!(sql.contains("ORDER BY updated_at ASC"));
    }

    #[test]
    fn test_build_select_window() {
        let from = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 3, 10, 23, 59, 59).unwrap();
        let window = TimeWindow {
            column: "created_at".to_string(),
            from,
            to,
        };
        let filters = IndexMap::from([("user_id".to_string(), FilterValue::Scalar(json!(42)))]);
        let extra = IndexMap::new();
        let qb = build_select(
            "deposits",
            &filters,
            &extra,
            None,
            Some(&window),
            "created_at",
            10_000,
            0,
        );
        let sql = qb.sql();
        assert!(sql.contains("user_id = $1"));
        assert!(sql.contains("created_at >= $2"));
        assert!(sql.contains("created_at <= $3"));
    }

    #[test]
    fn test_builtin_filters_compose() {
        let table = users_table();
        let extra = IndexMap::new();
        let qb = build_select(
            &table.source_table,
            &table.filters,
            &extra,
            None,
            None,
            &table.primary_key,
            1000,
            0,
        );
        let sql = qb.sql();
        assert!(sql.contains("status <> $1"));
        assert!(sql.contains("ORDER BY id ASC"));
    }

    #[test]
    fn test_read_options_default() {
        let opts = ReadOptions::default();
        assert_eq!(opts.batch_size, 1000);
        assert_eq!(opts.offset, 0);
        assert!(opts.watermark.is_none());
        assert!(opts.extra_filters.is_empty());
    }
}
