use std::sync::Arc;

use sbcval_core::{MarketDataSource, RateResolver, RunnerConfig};

use crate::cli::RateArgs;
use crate::error::CliError;

use super::{date_or_today, CommandResult};

pub async fn run(
    args: &RateArgs,
    source: Arc<dyn MarketDataSource>,
) -> Result<CommandResult, CliError> {
    if !args.term.is_finite() || args.term <= 0.0 {
        return Err(CliError::Command(String::from(
            "--term must be a positive number of years",
        )));
    }
    let as_of = date_or_today(args.date.as_deref())?;
    let lookback_days = RunnerConfig::from_env().yield_lookback_days;

    let resolved = RateResolver::new(source)
        .with_lookback_days(lookback_days)
        .resolve(args.term, as_of)
        .await;

    let warnings = resolved
        .failures
        .iter()
        .map(|failure| format!("{} yield unavailable: {}", failure.tenor, failure.reason))
        .collect::<Vec<_>>();
    let undefined = resolved.rate.is_none();

    let mut result =
        CommandResult::ok("rate", serde_json::to_value(&resolved)?).with_warnings(warnings);
    if undefined {
        result = result
            .with_warning("risk-free rate is undefined for this term")
            .with_failed(true);
    }
    Ok(result)
}
