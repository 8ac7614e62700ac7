use std::sync::Arc;

use sbcval_core::config::DEFAULT_DAYS_PER_YEAR;
use sbcval_core::{Frequency, MarketDataSource, Symbol, VolatilityEstimator, Window};
use serde_json::json;

use crate::cli::VolatilityArgs;
use crate::error::CliError;

use super::{date_or_today, CommandResult};

pub async fn run(
    args: &VolatilityArgs,
    source: Arc<dyn MarketDataSource>,
) -> Result<CommandResult, CliError> {
    let ticker = Symbol::parse(&args.ticker)?;
    let frequency = args.frequency.parse::<Frequency>()?;
    if !args.term.is_finite() || args.term <= 0.0 {
        return Err(CliError::Command(String::from(
            "--term must be a positive number of years",
        )));
    }
    let end = date_or_today(args.end.as_deref())?;
    let window = Window::lookback(end, args.term, DEFAULT_DAYS_PER_YEAR);

    let volatility = VolatilityEstimator::new(source)
        .ticker_volatility(&ticker, window, frequency)
        .await?;

    Ok(CommandResult::ok(
        "volatility",
        json!({
            "ticker": ticker,
            "frequency": frequency,
            "window": window,
            "volatility": volatility,
        }),
    ))
}
