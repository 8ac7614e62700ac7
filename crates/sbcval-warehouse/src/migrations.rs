use ::duckdb::{Connection, ToSql};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_valuation_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS public_comps (
    comp_id TEXT PRIMARY KEY,
    ticker TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS valuations (
    record_id TEXT PRIMARY KEY,
    valuation_id BIGINT NOT NULL UNIQUE,
    valuation_date TEXT,
    expected_term DOUBLE,
    share_price DOUBLE,
    strike_price DOUBLE,
    volatility_frequency TEXT,
    option_value DOUBLE,
    risk_free_rate DOUBLE,
    average_volatility DOUBLE,
    valued_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS valuation_comps (
    record_id TEXT NOT NULL,
    comp_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY(record_id, comp_id)
);

CREATE TABLE IF NOT EXISTS volatility_data (
    volatility_id TEXT PRIMARY KEY,
    comp_id TEXT NOT NULL,
    ticker TEXT NOT NULL,
    volatility DOUBLE NOT NULL,
    window_start DATE NOT NULL,
    window_end DATE NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS valuation_volatilities (
    record_id TEXT NOT NULL,
    volatility_id TEXT NOT NULL,
    PRIMARY KEY(record_id, volatility_id)
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_valuation_comps_record ON valuation_comps(record_id, position);
CREATE INDEX IF NOT EXISTS idx_volatility_data_comp ON volatility_data(comp_id, window_end);
"#,
    },
];

/// Bring the schema up to date. Already applied versions are skipped.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let params: [&dyn ToSql; 1] = [&migration.version];
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;
        if applied > 0 {
            continue;
        }

        log::debug!("applying warehouse migration {}", migration.version);
        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            params.as_slice(),
        )?;
    }

    Ok(())
}
