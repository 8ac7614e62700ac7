use sbcval_core::CallInputs;
use serde_json::json;

use crate::cli::PriceArgs;
use crate::error::CliError;

use super::CommandResult;

pub fn run(args: &PriceArgs) -> Result<CommandResult, CliError> {
    let inputs = CallInputs {
        spot: args.spot,
        strike: args.strike,
        term_years: args.term,
        rate: args.rate,
        volatility: args.volatility,
    };
    let option_value = inputs.price()?;

    let mut result = CommandResult::ok(
        "price",
        json!({
            "inputs": inputs,
            "option_value": option_value,
        }),
    );
    if inputs.spot < 0.0 || inputs.strike < 0.0 || inputs.term_years < 0.0 {
        result = result.with_warning("negative spot, strike or term; value is not meaningful");
    }
    Ok(result)
}
