// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL Driver
//!
//! A single, unpooled SQLx connection bound to one database.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use uuid::Uuid;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::TargetConnection;
use crate::engine::types::{ColumnInfo, QueryResult, Row as QRow, Value};

pub struct PostgresConnection {
    conn: PgConnection,
    database: String,
}

impl PostgresConnection {
    pub async fn connect(url: &str, database: &str, connect_timeout: Duration) -> EngineResult<Self> {
        let conn = tokio::time::timeout(connect_timeout, PgConnection::connect(url))
            .await
            .map_err(|_| {
                EngineError::connection_failed(format!(
                    "Timed out after {}s connecting to '{}'",
                    connect_timeout.as_secs(),
                    database
                ))
            })?
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("password authentication failed") {
                    EngineError::auth_failed(msg)
                } else {
                    EngineError::connection_failed(msg)
                }
            })?;

        Ok(Self {
            conn,
            database: database.to_string(),
        })
    }

    /// Converts a SQLx row to our universal Row type
    fn convert_row(pg_row: &PgRow) -> QRow {
        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(pg_row, col.ordinal()))
            .collect();

        QRow { values }
    }

    /// Extracts a value from a PgRow at the given index
    fn extract_value(row: &PgRow, idx: usize) -> Value {
        // try_get with Option<T> handles NULLs; a type mismatch falls through
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(float_value).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.map(|f| float_value(f as f64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Decimal>, _>(idx) {
            return v.map(decimal_value).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Uuid>, _>(idx) {
            return v.map(|u| Value::Text(u.to_string())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(Value::Bytes).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
            return v.map(Value::Json).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return v.map(|dt| Value::Text(dt.to_rfc3339())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return v
                .map(|dt| Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return v
                .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            return v
                .map(|t| Value::Text(t.format("%H:%M:%S").to_string()))
                .unwrap_or(Value::Null);
        }

        // Types without a mapping (arrays, ranges, geometric...) export as empty cells
        Value::Null
    }

    /// Gets column info from a PgRow
    fn get_column_info(row: &PgRow) -> Vec<ColumnInfo> {
        row.columns()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                data_type: col.type_info().name().to_string(),
                nullable: true,
            })
            .collect()
    }
}

pub(crate) fn float_value(f: f64) -> Value {
    if f.is_finite() {
        Value::Float(f)
    } else {
        Value::Text(f.to_string())
    }
}

pub(crate) fn decimal_value(d: Decimal) -> Value {
    use rust_decimal::prelude::ToPrimitive;

    match d.to_f64() {
        Some(f) if f.is_finite() => Value::Float(f),
        _ => Value::Text(d.to_string()),
    }
}

#[async_trait]
impl TargetConnection for PostgresConnection {
    async fn fetch_all(&mut self, sql: &str) -> EngineResult<QueryResult> {
        let start = Instant::now();

        let pg_rows: Vec<PgRow> = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| EngineError::execution_error(format!("{}: {}", self.database, e)))?;

        let columns = pg_rows
            .first()
            .map(Self::get_column_info)
            .unwrap_or_default();
        let rows = pg_rows.iter().map(Self::convert_row).collect();

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }

    async fn close(self: Box<Self>) -> EngineResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))
    }
}
