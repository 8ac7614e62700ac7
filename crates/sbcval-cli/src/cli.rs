//! CLI argument definitions for sbcval.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Value every pending record in the warehouse |
//! | `price` | Black-Scholes value of one call |
//! | `volatility` | Historical volatility of one ticker |
//! | `rate` | Term-matched risk-free rate for a date |
//! | `sql` | Query or seed the local DuckDB warehouse |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--timeout-ms` | `SBCVAL_TIMEOUT_MS` or 10000 | Market-data request timeout |
//! | `--mock` | `false` | Use the offline synthetic market data |
//! | `--db` | `$SBCVAL_HOME/cache/sbcval.duckdb` | Warehouse file |
//!
//! # Examples
//!
//! ```bash
//! sbcval sql --write "INSERT INTO public_comps (comp_id, ticker) VALUES ('comp1', 'MSFT')"
//! sbcval run --pretty
//! sbcval price --spot 100 --strike 95 --term 1 --rate 0.05 --volatility 0.2
//! sbcval rate --date 2022-01-01 --term 3
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Stock-compensation option valuations from market data.
#[derive(Debug, Parser)]
#[command(
    name = "sbcval",
    author,
    version,
    about = "Stock-compensation option valuation CLI"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Market-data request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Serve prices and yields from the deterministic offline source.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Warehouse database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Value every pending valuation record.
    Run,
    /// Price one European call.
    Price(PriceArgs),
    /// Estimate historical volatility for a ticker.
    Volatility(VolatilityArgs),
    /// Resolve the risk-free rate for a term.
    Rate(RateArgs),
    /// Run SQL against the local warehouse.
    Sql(SqlArgs),
}

#[derive(Debug, Args)]
pub struct PriceArgs {
    #[arg(long)]
    pub spot: f64,

    #[arg(long)]
    pub strike: f64,

    /// Expected term in years.
    #[arg(long)]
    pub term: f64,

    /// Risk-free rate as a decimal.
    #[arg(long)]
    pub rate: f64,

    /// Annualized volatility as a decimal.
    #[arg(long)]
    pub volatility: f64,
}

#[derive(Debug, Args)]
pub struct VolatilityArgs {
    /// Ticker symbol (e.g. MSFT).
    pub ticker: String,

    /// Last day of the window (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub end: Option<String>,

    /// Window length in years.
    #[arg(long, default_value_t = 1.0)]
    pub term: f64,

    /// Sampling frequency: daily, weekly or monthly.
    #[arg(long, default_value = "daily")]
    pub frequency: String,
}

#[derive(Debug, Args)]
pub struct RateArgs {
    /// Valuation date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Expected term in years.
    #[arg(long)]
    pub term: f64,
}

/// Arguments for the `sql` command.
#[derive(Debug, Args)]
pub struct SqlArgs {
    /// SQL query to execute.
    pub query: String,

    /// Allow write statements (INSERT, UPDATE, CREATE...).
    #[arg(long, default_value_t = false)]
    pub write: bool,

    /// Maximum number of rows to return.
    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    /// Query timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["sbcval", "run", "--mock", "--pretty", "--db", "v.duckdb"])
            .expect("parse");

        assert!(cli.mock);
        assert!(cli.pretty);
        assert_eq!(cli.db, Some(PathBuf::from("v.duckdb")));
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn price_requires_every_input() {
        let error = Cli::try_parse_from(["sbcval", "price", "--spot", "100"]).expect_err("missing");
        assert_eq!(error.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn sql_defaults_to_read_only_guardrails() {
        let cli = Cli::try_parse_from(["sbcval", "sql", "SELECT 1"]).expect("parse");
        let Command::Sql(args) = cli.command else {
            panic!("expected sql command");
        };
        assert!(!args.write);
        assert_eq!(args.max_rows, 10_000);
        assert_eq!(args.query_timeout_ms, 5_000);
    }
}
