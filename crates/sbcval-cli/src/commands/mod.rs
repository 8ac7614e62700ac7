mod price;
mod rate;
mod run;
mod sql;
mod volatility;

use std::sync::Arc;

use sbcval_core::domain::dates::parse_date;
use sbcval_core::{MarketDataSource, SyntheticMarketData, YahooAdapter, YahooConfig};
use sbcval_warehouse::{Warehouse, WarehouseConfig};
use serde_json::Value;
use time::{Date, OffsetDateTime};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub command: &'static str,
    pub data: Value,
    pub warnings: Vec<String>,
    /// Set when the command ran but some of its work failed.
    pub failed: bool,
}

impl CommandResult {
    pub fn ok(command: &'static str, data: Value) -> Self {
        Self {
            command,
            data,
            warnings: Vec::new(),
            failed: false,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_failed(mut self, failed: bool) -> Self {
        self.failed = failed;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Run => run::run(market_data(cli), open_warehouse(cli)?).await,
        Command::Price(args) => price::run(args),
        Command::Volatility(args) => volatility::run(args, market_data(cli)).await,
        Command::Rate(args) => rate::run(args, market_data(cli)).await,
        Command::Sql(args) => sql::run(args, &open_warehouse(cli)?),
    }
}

fn market_data(cli: &Cli) -> Arc<dyn MarketDataSource> {
    if cli.mock {
        return Arc::new(SyntheticMarketData);
    }

    let mut config = YahooConfig::from_env();
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }
    Arc::new(YahooAdapter::new(config))
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db {
        Some(path) => WarehouseConfig::with_db_path(path.clone()),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}

/// `YYYY-MM-DD`, or today in UTC when absent.
fn date_or_today(value: Option<&str>) -> Result<Date, CliError> {
    match value {
        Some(raw) => Ok(parse_date(raw)?),
        None => Ok(OffsetDateTime::now_utc().date()),
    }
}
