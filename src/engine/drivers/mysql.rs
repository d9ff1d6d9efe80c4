// SPDX-License-Identifier: Apache-2.0

//! MySQL Driver
//!
//! A single, unpooled SQLx connection bound to one MySQL/MariaDB database.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Row, TypeInfo};

use crate::engine::drivers::postgres::{decimal_value, float_value};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::TargetConnection;
use crate::engine::types::{ColumnInfo, QueryResult, Row as QRow, Value};

pub struct MySqlTargetConnection {
    conn: MySqlConnection,
    database: String,
}

impl MySqlTargetConnection {
    pub async fn connect(url: &str, database: &str, connect_timeout: Duration) -> EngineResult<Self> {
        let conn = tokio::time::timeout(connect_timeout, MySqlConnection::connect(url))
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
                if msg.contains("Access denied") {
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
    fn convert_row(mysql_row: &MySqlRow) -> QRow {
        let values: Vec<Value> = mysql_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(mysql_row, col.ordinal()))
            .collect();

        QRow { values }
    }

    /// Extracts a value from a MySqlRow at the given index
    fn extract_value(row: &MySqlRow, idx: usize) -> Value {
        // Try u64 first for BIGINT UNSIGNED columns
        if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            return v
                .map(|u| i64::try_from(u).map(Value::Int).unwrap_or_else(|_| Value::Text(u.to_string())))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
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
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
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
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(Value::Bytes).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
            return v.map(Value::Json).unwrap_or(Value::Null);
        }

        Value::Null
    }

    /// Gets column info from a MySqlRow
    fn get_column_info(row: &MySqlRow) -> Vec<ColumnInfo> {
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

#[async_trait]
impl TargetConnection for MySqlTargetConnection {
    async fn fetch_all(&mut self, sql: &str) -> EngineResult<QueryResult> {
        let start = Instant::now();

        let mysql_rows: Vec<MySqlRow> = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| EngineError::execution_error(format!("{}: {}", self.database, e)))?;

        let columns = mysql_rows
            .first()
            .map(Self::get_column_info)
            .unwrap_or_default();
        let rows = mysql_rows.iter().map(Self::convert_row).collect();

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
