//! Ad-hoc SQL against the warehouse with row and time limits.

use std::time::{Duration, Instant};

use ::duckdb::types::Value as DuckValue;
use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::WarehouseError;

#[derive(Debug, Clone, Copy)]
pub struct QueryGuardrails {
    pub max_rows: usize,
    pub query_timeout_ms: u64,
}

impl Default for QueryGuardrails {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            query_timeout_ms: 5_000,
        }
    }
}

impl QueryGuardrails {
    fn timeout(self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }

    pub(crate) fn validate(self) -> Result<(), WarehouseError> {
        if self.max_rows == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--max-rows must be greater than zero",
            )));
        }
        if self.query_timeout_ms == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--query-timeout-ms must be greater than zero",
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<SqlColumn>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub truncated: bool,
}

impl QueryResult {
    fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            truncated: false,
        }
    }
}

/// Trimmed statement without its trailing semicolon.
pub(crate) fn normalize_sql(sql: &str) -> Result<&str, WarehouseError> {
    let normalized = sql.trim().trim_end_matches(';').trim();
    if normalized.is_empty() {
        return Err(WarehouseError::QueryRejected(String::from(
            "query must not be empty",
        )));
    }
    Ok(normalized)
}

pub(crate) fn enforce_read_only(sql: &str) -> Result<(), WarehouseError> {
    if !is_select_like(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "read-only mode accepts only SELECT/CTE queries; use --write for write statements",
        )));
    }
    if sql.split(';').filter(|part| !part.trim().is_empty()).count() > 1 {
        return Err(WarehouseError::QueryRejected(String::from(
            "multiple SQL statements are not allowed in read-only mode",
        )));
    }
    Ok(())
}

pub(crate) fn run(
    connection: &Connection,
    sql: &str,
    guardrails: QueryGuardrails,
) -> Result<QueryResult, WarehouseError> {
    let started = Instant::now();
    if !is_select_like(sql) {
        connection.execute_batch(sql)?;
        check_elapsed(started, guardrails.timeout())?;
        return Ok(QueryResult::empty());
    }

    let mut statement = connection.prepare(sql)?;
    // column metadata is only populated once the statement has run
    let _ = statement.query([] as [&dyn ToSql; 0])?;
    let column_count = statement.column_count();
    let columns = (0..column_count)
        .map(|index| SqlColumn {
            name: statement
                .column_name(index)
                .map(|name| name.to_string())
                .unwrap_or_else(|_| format!("column_{index}")),
            r#type: statement.column_type(index).to_string(),
        })
        .collect();

    let mut cursor = statement.query([] as [&dyn ToSql; 0])?;
    let mut rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = cursor.next()? {
        check_elapsed(started, guardrails.timeout())?;
        if rows.len() >= guardrails.max_rows {
            truncated = true;
            break;
        }
        let values = (0..column_count)
            .map(|index| row.get::<_, DuckValue>(index).map(to_json_value))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(values);
    }
    check_elapsed(started, guardrails.timeout())?;

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn to_json_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(value) => Value::Bool(value),
        DuckValue::TinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::SmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::Int(value) => Value::Number(Number::from(value)),
        DuckValue::BigInt(value) => Value::Number(Number::from(value)),
        DuckValue::UTinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::USmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::UInt(value) => Value::Number(Number::from(value)),
        DuckValue::UBigInt(value) => Value::Number(Number::from(value)),
        DuckValue::Float(value) => number_from_f64(f64::from(value)),
        DuckValue::Double(value) => number_from_f64(value),
        DuckValue::Text(value) => Value::String(value),
        DuckValue::Blob(value) => Value::String(hex::encode(value)),
        other => Value::String(format!("{other:?}")),
    }
}

fn number_from_f64(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn is_select_like(sql: &str) -> bool {
    let first_keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        first_keyword.as_str(),
        "SELECT" | "WITH" | "EXPLAIN" | "SHOW" | "DESCRIBE"
    )
}

fn check_elapsed(started: Instant, timeout: Duration) -> Result<(), WarehouseError> {
    if started.elapsed() > timeout {
        return Err(WarehouseError::QueryTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_rejects_writes_and_stacked_statements() {
        assert!(enforce_read_only("SELECT 1").is_ok());
        assert!(enforce_read_only("with t as (select 1) select * from t").is_ok());
        assert!(matches!(
            enforce_read_only("DELETE FROM valuations"),
            Err(WarehouseError::QueryRejected(_))
        ));
        assert!(matches!(
            enforce_read_only("SELECT 1; DROP TABLE valuations"),
            Err(WarehouseError::QueryRejected(_))
        ));
    }

    #[test]
    fn empty_statement_is_rejected() {
        assert!(normalize_sql("  ;  ").is_err());
        assert_eq!(normalize_sql(" SELECT 1; ").expect("sql"), "SELECT 1");
    }

    #[test]
    fn select_rows_are_truncated_at_max_rows() {
        let connection = Connection::open_in_memory().expect("in-memory duckdb");
        let result = run(
            &connection,
            "SELECT i AS n, i / 2 AS half FROM range(5) t(i)",
            QueryGuardrails {
                max_rows: 3,
                query_timeout_ms: 5_000,
            },
        )
        .expect("query");

        assert_eq!(result.row_count, 3);
        assert!(result.truncated);
        assert_eq!(result.columns[0].name, "n");
        assert_eq!(result.rows[1][1], serde_json::json!(0.5));
    }

    #[test]
    fn blobs_render_as_hex() {
        assert_eq!(
            to_json_value(DuckValue::Blob(vec![0xab, 0x01, 0xff])),
            Value::String(String::from("ab01ff"))
        );
        assert_eq!(to_json_value(DuckValue::Double(f64::NAN)), Value::Null);
    }
}
