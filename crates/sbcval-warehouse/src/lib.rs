//! DuckDB-backed [`RecordStore`] for sbcval.
//!
//! The warehouse keeps comparables, valuations and the volatility records a
//! run produces in a single database file under `SBCVAL_HOME`.

pub mod duckdb;
pub mod migrations;
pub mod query;

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, ToSql};
use sbcval_core::domain::dates::format_date;
use sbcval_core::store::new_volatility_id;
use sbcval_core::{RecordStore, StoreError, ValuationRecord, ValuationResult, VolatilityResult};
use thiserror::Error;

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};
pub use query::{QueryGuardrails, QueryResult, SqlColumn};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<WarehouseError> for StoreError {
    fn from(error: WarehouseError) -> Self {
        match error {
            WarehouseError::Store(error) => error,
            other => StoreError::backend(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub sbcval_home: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    /// Config rooted at the default home but storing the database at `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let sbcval_home = resolve_sbcval_home();
        let db_path = sbcval_home.join("cache").join("sbcval.duckdb");
        Self {
            sbcval_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::new(config.db_path, config.max_pool_size);
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Run ad-hoc SQL. Without `allow_write` only a single SELECT-like
    /// statement is accepted.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
        allow_write: bool,
    ) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = query::normalize_sql(sql)?;

        if !allow_write {
            query::enforce_read_only(sql)?;
        }

        let mode = if allow_write {
            AccessMode::ReadWrite
        } else {
            AccessMode::ReadOnly
        };
        let connection = self.manager.acquire(mode)?;
        query::run(&connection, sql, guardrails)
    }

    pub fn insert_comparable(&self, comp_id: &str, ticker: &str) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let params: [&dyn ToSql; 2] = [&comp_id, &ticker];
        connection.execute(
            "INSERT OR REPLACE INTO public_comps (comp_id, ticker) VALUES (?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Insert a valuation together with its ordered comparable set.
    pub fn insert_valuation(&self, record: &ValuationRecord) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            let params: [&dyn ToSql; 8] = [
                &record.record_id,
                &record.valuation_id,
                &record.valuation_date,
                &record.expected_term,
                &record.share_price,
                &record.strike_price,
                &record.volatility_frequency,
                &record.option_value,
            ];
            connection.execute(
                r#"
INSERT INTO valuations (
    record_id, valuation_id, valuation_date, expected_term, share_price,
    strike_price, volatility_frequency, option_value
) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#,
                params.as_slice(),
            )?;

            for (position, comp_id) in record.public_comp_set.iter().enumerate() {
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                let params: [&dyn ToSql; 3] = [&record.record_id, comp_id, &position];
                connection.execute(
                    "INSERT INTO valuation_comps (record_id, comp_id, position) VALUES (?, ?, ?)",
                    params.as_slice(),
                )?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    pub fn valuation(&self, record_id: &str) -> Result<Option<ValuationRecord>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let mut records = load_valuations(&connection, Some(record_id))?;
        Ok(records.pop())
    }

    /// Stored result of a completed valuation, `None` while it is pending.
    pub fn valuation_result(
        &self,
        record_id: &str,
    ) -> Result<Option<ValuationResult>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let params: [&dyn ToSql; 1] = [&record_id];
        let row = connection.query_row(
            r#"
SELECT option_value, risk_free_rate, average_volatility
FROM valuations
WHERE record_id = ?
"#,
            params.as_slice(),
            |row| {
                Ok((
                    row.get::<_, Option<f64>>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            },
        );
        let (option_value, risk_free_rate, average_volatility) = match row {
            Ok(values) => values,
            Err(::duckdb::Error::QueryReturnedNoRows) => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let (Some(option_value), Some(risk_free_rate), Some(average_volatility)) =
            (option_value, risk_free_rate, average_volatility)
        else {
            return Ok(None);
        };

        Ok(Some(ValuationResult {
            option_value,
            risk_free_rate,
            average_volatility,
            volatility_ids: linked_volatility_ids(&connection, record_id)?,
        }))
    }

    pub fn volatility_count(&self) -> Result<i64, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let count = connection.query_row(
            "SELECT COUNT(*) FROM volatility_data",
            [] as [&dyn ToSql; 0],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl RecordStore for Warehouse {
    fn valuation_records(&self) -> Result<Vec<ValuationRecord>, StoreError> {
        let connection = self
            .manager
            .acquire(AccessMode::ReadWrite)
            .map_err(WarehouseError::from)?;
        Ok(load_valuations(&connection, None)?)
    }

    fn comparable_ticker(&self, comp_id: &str) -> Result<String, StoreError> {
        let connection = self
            .manager
            .acquire(AccessMode::ReadWrite)
            .map_err(WarehouseError::from)?;
        let params: [&dyn ToSql; 1] = [&comp_id];
        match connection.query_row(
            "SELECT ticker FROM public_comps WHERE comp_id = ?",
            params.as_slice(),
            |row| row.get::<_, String>(0),
        ) {
            Ok(ticker) => Ok(ticker),
            Err(::duckdb::Error::QueryReturnedNoRows) => Err(StoreError::NotFound {
                entity: "comparable",
                id: comp_id.to_owned(),
            }),
            Err(error) => Err(WarehouseError::from(error).into()),
        }
    }

    fn create_volatility_record(&self, result: &VolatilityResult) -> Result<String, StoreError> {
        let connection = self
            .manager
            .acquire(AccessMode::ReadWrite)
            .map_err(WarehouseError::from)?;
        let volatility_id = new_volatility_id();
        let ticker = result.ticker.as_str();
        let window_start = format_date(result.window_start);
        let window_end = format_date(result.window_end);
        let params: [&dyn ToSql; 6] = [
            &volatility_id,
            &result.comp_id,
            &ticker,
            &result.volatility,
            &window_start,
            &window_end,
        ];
        connection
            .execute(
                r#"
INSERT INTO volatility_data (
    volatility_id, comp_id, ticker, volatility, window_start, window_end
) VALUES (?, ?, ?, ?, CAST(? AS DATE), CAST(? AS DATE))
"#,
                params.as_slice(),
            )
            .map_err(WarehouseError::from)?;
        Ok(volatility_id)
    }

    fn complete_valuation(
        &self,
        record_id: &str,
        result: &ValuationResult,
    ) -> Result<(), StoreError> {
        let connection = self
            .manager
            .acquire(AccessMode::ReadWrite)
            .map_err(WarehouseError::from)?;
        connection
            .execute_batch("BEGIN TRANSACTION")
            .map_err(WarehouseError::from)?;
        let outcome = (|| -> Result<(), WarehouseError> {
            let params: [&dyn ToSql; 1] = [&record_id];
            let existing = match connection.query_row(
                "SELECT option_value FROM valuations WHERE record_id = ?",
                params.as_slice(),
                |row| row.get::<_, Option<f64>>(0),
            ) {
                Ok(existing) => existing,
                Err(::duckdb::Error::QueryReturnedNoRows) => {
                    return Err(StoreError::NotFound {
                        entity: "valuation",
                        id: record_id.to_owned(),
                    }
                    .into())
                }
                Err(error) => return Err(error.into()),
            };
            if existing.is_some() {
                return Err(StoreError::AlreadyValued {
                    record_id: record_id.to_owned(),
                }
                .into());
            }

            let params: [&dyn ToSql; 4] = [
                &result.option_value,
                &result.risk_free_rate,
                &result.average_volatility,
                &record_id,
            ];
            connection.execute(
                r#"
UPDATE valuations
SET option_value = ?, risk_free_rate = ?, average_volatility = ?, valued_at = CURRENT_TIMESTAMP
WHERE record_id = ?
"#,
                params.as_slice(),
            )?;

            for volatility_id in &result.volatility_ids {
                let params: [&dyn ToSql; 2] = [&record_id, volatility_id];
                connection.execute(
                    "INSERT OR IGNORE INTO valuation_volatilities (record_id, volatility_id) VALUES (?, ?)",
                    params.as_slice(),
                )?;
            }
            Ok(())
        })();

        Ok(finalize_transaction(&connection, outcome)?)
    }
}

fn load_valuations(
    connection: &Connection,
    record_id: Option<&str>,
) -> Result<Vec<ValuationRecord>, WarehouseError> {
    let filter = if record_id.is_some() {
        "WHERE record_id = ?"
    } else {
        ""
    };
    let params: Vec<&dyn ToSql> = match &record_id {
        Some(record_id) => vec![record_id],
        None => Vec::new(),
    };

    let sql = format!(
        r#"
SELECT record_id, valuation_id, valuation_date, expected_term, share_price,
       strike_price, volatility_frequency, option_value
FROM valuations
{filter}
ORDER BY valuation_id
"#
    );
    let mut statement = connection.prepare(sql.as_str())?;
    let mut records = statement
        .query_map(params.as_slice(), |row| {
            Ok(ValuationRecord {
                record_id: row.get(0)?,
                valuation_id: row.get(1)?,
                valuation_date: row.get(2)?,
                expected_term: row.get(3)?,
                share_price: row.get(4)?,
                strike_price: row.get(5)?,
                volatility_frequency: row.get(6)?,
                public_comp_set: Vec::new(),
                option_value: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let sql = format!(
        r#"
SELECT record_id, comp_id
FROM valuation_comps
{filter}
ORDER BY record_id, position
"#
    );
    let mut statement = connection.prepare(sql.as_str())?;
    let links = statement
        .query_map(params.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut comps: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (record_id, comp_id) in links {
        comps.entry(record_id).or_default().push(comp_id);
    }
    for record in &mut records {
        record.public_comp_set = comps.remove(&record.record_id).unwrap_or_default();
    }

    Ok(records)
}

fn linked_volatility_ids(
    connection: &Connection,
    record_id: &str,
) -> Result<Vec<String>, WarehouseError> {
    let params: [&dyn ToSql; 1] = [&record_id];
    let mut statement = connection.prepare(
        "SELECT volatility_id FROM valuation_volatilities WHERE record_id = ? ORDER BY volatility_id",
    )?;
    let ids = statement
        .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_sbcval_home() -> PathBuf {
    if let Some(path) = env::var_os("SBCVAL_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".sbcval");
    }

    PathBuf::from(".sbcval")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbcval_core::Symbol;
    use tempfile::{tempdir, TempDir};
    use time::macros::date;

    fn open_temp() -> (TempDir, Warehouse) {
        let temp = tempdir().expect("tempdir");
        let sbcval_home = temp.path().join("sbcval-home");
        let db_path = sbcval_home.join("cache").join("sbcval.duckdb");
        let warehouse = Warehouse::open(WarehouseConfig {
            sbcval_home,
            db_path,
            max_pool_size: 2,
        })
        .expect("warehouse open");
        (temp, warehouse)
    }

    fn pending(record_id: &str, valuation_id: i64, comps: &[&str]) -> ValuationRecord {
        ValuationRecord {
            record_id: record_id.to_owned(),
            valuation_id,
            valuation_date: Some(String::from("2022-01-01")),
            expected_term: Some(3.0),
            share_price: Some(100.0),
            strike_price: Some(95.0),
            volatility_frequency: Some(String::from("Daily")),
            public_comp_set: comps.iter().map(|comp| (*comp).to_owned()).collect(),
            option_value: None,
        }
    }

    #[test]
    fn initializes_valuation_tables() {
        let (_temp, warehouse) = open_temp();

        let query = warehouse
            .execute_query(
                "SELECT table_name FROM information_schema.tables WHERE table_name = 'volatility_data'",
                QueryGuardrails::default(),
                false,
            )
            .expect("query");
        assert_eq!(query.row_count, 1);
    }

    #[test]
    fn read_only_mode_rejects_write_query() {
        let (_temp, warehouse) = open_temp();

        let error = warehouse
            .execute_query(
                "DELETE FROM valuations",
                QueryGuardrails::default(),
                false,
            )
            .expect_err("should reject");

        assert!(matches!(error, WarehouseError::QueryRejected(_)));
    }

    #[test]
    fn valuation_records_keep_comparable_order() {
        let (_temp, warehouse) = open_temp();
        warehouse
            .insert_valuation(&pending("recB", 2, &["compZ", "compA"]))
            .expect("insert");
        warehouse
            .insert_valuation(&pending("recA", 1, &[]))
            .expect("insert");

        let records = warehouse.valuation_records().expect("records");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_id, "recA");
        assert!(records[0].public_comp_set.is_empty());
        assert_eq!(records[1].public_comp_set, vec!["compZ", "compA"]);
        assert_eq!(records[1].valuation_date.as_deref(), Some("2022-01-01"));
    }

    #[test]
    fn unknown_comparable_is_not_found() {
        let (_temp, warehouse) = open_temp();
        warehouse.insert_comparable("comp1", "msft").expect("insert");

        assert_eq!(warehouse.comparable_ticker("comp1").expect("ticker"), "msft");
        assert!(matches!(
            warehouse.comparable_ticker("comp2"),
            Err(StoreError::NotFound { entity: "comparable", .. })
        ));
    }

    #[test]
    fn completes_valuation_once_and_links_volatilities() {
        let (_temp, warehouse) = open_temp();
        warehouse
            .insert_valuation(&pending("recA", 1, &["comp1"]))
            .expect("insert");
        let volatility_id = warehouse
            .create_volatility_record(&VolatilityResult {
                ticker: Symbol::parse("MSFT").expect("symbol"),
                comp_id: String::from("comp1"),
                volatility: 0.25,
                window_start: date!(2019 - 01 - 02),
                window_end: date!(2022 - 01 - 01),
            })
            .expect("volatility record");
        let result = ValuationResult {
            option_value: 24.1234,
            risk_free_rate: 0.03,
            average_volatility: 0.25,
            volatility_ids: vec![volatility_id.clone()],
        };

        warehouse
            .complete_valuation("recA", &result)
            .expect("complete");
        let again = warehouse.complete_valuation("recA", &result);

        assert!(matches!(again, Err(StoreError::AlreadyValued { .. })));
        assert_eq!(
            warehouse.valuation_result("recA").expect("result"),
            Some(result)
        );
        assert_eq!(warehouse.volatility_count().expect("count"), 1);
        let stored = warehouse.valuation("recA").expect("load").expect("record");
        assert!(stored.is_valued());
    }

    #[test]
    fn completing_missing_valuation_is_not_found() {
        let (_temp, warehouse) = open_temp();
        let result = ValuationResult {
            option_value: 1.0,
            risk_free_rate: 0.01,
            average_volatility: 0.2,
            volatility_ids: Vec::new(),
        };

        assert!(matches!(
            warehouse.complete_valuation("recMissing", &result),
            Err(StoreError::NotFound { entity: "valuation", .. })
        ));
        assert_eq!(warehouse.valuation_result("recMissing").expect("result"), None);
    }
}
