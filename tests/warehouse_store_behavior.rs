//! Behavior-driven tests for the DuckDB record store
//!
//! These tests seed the warehouse the way an operator would, run a batch
//! against it and read the results back through SQL.

use sbcval_core::{
    InMemoryMarketData, Outcome, RecordStore, RunnerConfig, Tenor, ValuationRunner,
};
use sbcval_tests::{pending_record, quote_tenors, symbol, zigzag_prices, Arc};
use sbcval_warehouse::{QueryGuardrails, Warehouse, WarehouseConfig, WarehouseError};
use tempfile::{tempdir, TempDir};
use time::macros::date;

fn open_warehouse() -> (TempDir, Arc<Warehouse>) {
    let temp = tempdir().expect("tempdir");
    let warehouse = Warehouse::open(WarehouseConfig {
        sbcval_home: temp.path().to_path_buf(),
        db_path: temp.path().join("cache").join("sbcval.duckdb"),
        max_pool_size: 2,
    })
    .expect("warehouse open");
    (temp, Arc::new(warehouse))
}

fn market() -> InMemoryMarketData {
    let prices = zigzag_prices(date!(2018 - 06 - 01), date!(2022 - 01 - 31), 100.0, 0.02);
    let source = InMemoryMarketData::new().with_prices(symbol("NVDA"), prices);
    quote_tenors(source, &Tenor::ALL, date!(2021 - 12 - 31), 1.8)
}

// =============================================================================
// Warehouse: Seeding through SQL
// =============================================================================

#[test]
fn when_operator_seeds_records_with_sql_they_are_listed_as_pending() {
    // Given: A fresh warehouse
    let (_temp, warehouse) = open_warehouse();

    // When: Comparables and a valuation are inserted with write-enabled SQL
    warehouse
        .execute_query(
            r#"
INSERT INTO public_comps (comp_id, ticker) VALUES ('comp1', 'nvda');
INSERT INTO valuations (record_id, valuation_id, valuation_date, expected_term, share_price, strike_price, volatility_frequency)
VALUES ('rec1', 7, '2022-01-01', 2.0, 30.0, 25.0, 'Weekly');
INSERT INTO valuation_comps (record_id, comp_id, position) VALUES ('rec1', 'comp1', 0);
"#,
            QueryGuardrails::default(),
            true,
        )
        .expect("seed");

    // Then: The record store lists it with its comparable set
    let records = warehouse.valuation_records().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].valuation_id, 7);
    assert_eq!(records[0].public_comp_set, vec!["comp1"]);
    assert_eq!(records[0].volatility_frequency.as_deref(), Some("Weekly"));
    assert!(!records[0].is_valued());
    assert_eq!(warehouse.comparable_ticker("comp1").expect("ticker"), "nvda");
}

#[test]
fn when_sql_is_read_only_writes_are_rejected() {
    let (_temp, warehouse) = open_warehouse();

    let error = warehouse
        .execute_query(
            "UPDATE valuations SET option_value = 1",
            QueryGuardrails::default(),
            false,
        )
        .expect_err("should reject");

    assert!(matches!(error, WarehouseError::QueryRejected(_)));
}

// =============================================================================
// Warehouse: Batch write-back
// =============================================================================

#[tokio::test]
async fn when_a_batch_completes_results_are_written_back_and_linked() {
    // Given: A seeded warehouse with one pending valuation
    let (_temp, warehouse) = open_warehouse();
    warehouse.insert_comparable("comp1", "NVDA").expect("comp");
    warehouse
        .insert_valuation(&pending_record("rec1", 1, &["comp1"]))
        .expect("valuation");
    let runner = ValuationRunner::new(
        Arc::new(market()),
        warehouse.clone(),
        RunnerConfig::default(),
    );

    // When: The batch runs
    let report = runner.run_batch().await.expect("batch runs");

    // Then: The stored result matches the reported one
    let Outcome::Completed {
        option_value,
        volatility_ids,
        ..
    } = &report.valuations[0].outcome
    else {
        panic!("expected completion, got {:?}", report.valuations[0].outcome);
    };
    let stored = warehouse
        .valuation_result("rec1")
        .expect("load")
        .expect("completed result");
    assert_eq!(stored.option_value, *option_value);
    assert_eq!(stored.risk_free_rate, 0.018);
    assert_eq!(stored.volatility_ids, *volatility_ids);

    // And: The volatility row is queryable with its window
    let rows = warehouse
        .execute_query(
            "SELECT ticker, CAST(window_end AS VARCHAR) AS window_end FROM volatility_data",
            QueryGuardrails::default(),
            false,
        )
        .expect("query");
    assert_eq!(rows.row_count, 1);
    assert_eq!(rows.rows[0][0], "NVDA");
    assert_eq!(rows.rows[0][1], "2022-01-01");
}

#[tokio::test]
async fn when_a_batch_runs_twice_completed_records_are_skipped() {
    // Given: A warehouse whose only valuation was completed by a first run
    let (_temp, warehouse) = open_warehouse();
    warehouse.insert_comparable("comp1", "NVDA").expect("comp");
    warehouse
        .insert_valuation(&pending_record("rec1", 1, &["comp1"]))
        .expect("valuation");
    let runner = ValuationRunner::new(
        Arc::new(market()),
        warehouse.clone(),
        RunnerConfig::default(),
    );
    runner.run_batch().await.expect("first run");

    // When: The batch runs again
    let second = runner.run_batch().await.expect("second run");

    // Then: Nothing is re-valued and no extra volatility rows appear
    assert_eq!(second.summary.skipped, 1);
    assert_eq!(second.summary.completed, 0);
    assert_eq!(warehouse.volatility_count().expect("count"), 1);
}
