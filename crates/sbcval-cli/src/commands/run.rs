use std::sync::Arc;

use sbcval_core::{MarketDataSource, RunnerConfig, ValuationRunner};
use sbcval_warehouse::Warehouse;

use crate::error::CliError;

use super::CommandResult;

pub async fn run(
    source: Arc<dyn MarketDataSource>,
    warehouse: Warehouse,
) -> Result<CommandResult, CliError> {
    log::info!("valuing pending records in {}", warehouse.db_path().display());
    let runner = ValuationRunner::new(source, Arc::new(warehouse), RunnerConfig::from_env());
    let report = runner.run_batch().await?;

    let warnings = report
        .valuations
        .iter()
        .flat_map(|valuation| {
            valuation
                .warnings
                .iter()
                .map(move |warning| format!("valuation {}: {warning}", valuation.valuation_id))
        })
        .collect::<Vec<_>>();

    Ok(CommandResult::ok("run", serde_json::to_value(&report)?)
        .with_warnings(warnings)
        .with_failed(report.has_failures()))
}
