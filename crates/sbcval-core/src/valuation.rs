//! Batch valuation of pending tranches.
//!
//! [`ValuationRunner::run_batch`] reads every valuation record, skips the ones
//! that already carry an option value, and values the rest in `valuation_id`
//! order: comparables to average volatility, valuation date and term to a
//! risk-free rate, then the call price. Results are written back only after the
//! whole computation succeeded, so an undefined volatility, rate or price
//! leaves the record pending.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::RunnerConfig;
use crate::market_data::MarketDataSource;
use crate::pricing;
use crate::rates::RateResolver;
use crate::store::{RecordStore, StoreError};
use crate::volatility::{Comparable, ComparableFailure, VolatilityEstimator, Window};
use crate::{Symbol, ValuationRecord, ValuationRequest, ValuationResult};

/// What happened to one valuation record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        option_value: f64,
        risk_free_rate: f64,
        average_volatility: f64,
        volatility_ids: Vec<String>,
    },
    /// Already valued, or nothing to value it against.
    Skipped { reason: String },
    /// Volatility, rate or price could not be determined; nothing was written.
    Undefined { reason: String },
    /// Malformed record or a failed write-back.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationReport {
    pub record_id: String,
    pub valuation_id: i64,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub skipped: usize,
    pub undefined: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub valuations: Vec<ValuationReport>,
}

impl BatchReport {
    fn push(&mut self, report: ValuationReport) {
        match report.outcome {
            Outcome::Completed { .. } => self.summary.completed += 1,
            Outcome::Skipped { .. } => self.summary.skipped += 1,
            Outcome::Undefined { .. } => self.summary.undefined += 1,
            Outcome::Failed { .. } => self.summary.failed += 1,
        }
        self.valuations.push(report);
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn find(&self, record_id: &str) -> Option<&ValuationReport> {
        self.valuations
            .iter()
            .find(|report| report.record_id == record_id)
    }
}

/// Runs the valuation pipeline against a market-data source and a record store.
#[derive(Clone)]
pub struct ValuationRunner {
    store: Arc<dyn RecordStore>,
    estimator: VolatilityEstimator,
    resolver: RateResolver,
    config: RunnerConfig,
}

impl ValuationRunner {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn RecordStore>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            store,
            estimator: VolatilityEstimator::new(Arc::clone(&source)),
            resolver: RateResolver::new(source).with_lookback_days(config.yield_lookback_days),
            config,
        }
    }

    /// Value every pending record.
    ///
    /// # Errors
    ///
    /// Only listing the records can fail the batch; per-record failures are
    /// reported as [`Outcome::Failed`].
    pub async fn run_batch(&self) -> Result<BatchReport, StoreError> {
        let mut records = self.store.valuation_records()?;
        records.sort_by_key(|record| record.valuation_id);
        info!("found {} valuation record(s)", records.len());

        let mut batch = BatchReport::default();
        for record in &records {
            batch.push(self.value_record(record).await);
        }

        info!(
            "batch finished: {} completed, {} skipped, {} undefined, {} failed",
            batch.summary.completed,
            batch.summary.skipped,
            batch.summary.undefined,
            batch.summary.failed
        );
        Ok(batch)
    }

    pub async fn value_record(&self, record: &ValuationRecord) -> ValuationReport {
        let mut warnings = Vec::new();
        let outcome = self.outcome_for(record, &mut warnings).await;
        ValuationReport {
            record_id: record.record_id.clone(),
            valuation_id: record.valuation_id,
            outcome,
            warnings,
        }
    }

    async fn outcome_for(&self, record: &ValuationRecord, warnings: &mut Vec<String>) -> Outcome {
        if record.is_valued() {
            debug!("valuation {} already has an option value", record.valuation_id);
            return Outcome::Skipped {
                reason: String::from("already valued"),
            };
        }

        let request = match ValuationRequest::try_from(record) {
            Ok(request) => request,
            Err(error) => {
                warn!("skipping malformed valuation {}: {error}", record.valuation_id);
                return Outcome::Failed {
                    error: error.to_string(),
                };
            }
        };
        info!("processing valuation {}", request.valuation_id);

        if request.comparables.is_empty() {
            let reason = format!(
                "no public comparables for valuation {}",
                request.valuation_id
            );
            warn!("{reason}");
            warnings.push(reason.clone());
            return Outcome::Skipped { reason };
        }

        let comparables = self.resolve_comparables(&request.comparables, warnings);
        let window = Window::lookback(
            request.valuation_date,
            request.expected_term,
            self.config.days_per_year,
        );
        let average = self
            .estimator
            .average_volatility(&comparables, window, request.frequency)
            .await;
        warnings.extend(average.failures.iter().map(describe_failure));
        let Some(average_volatility) = average.average else {
            return Outcome::Undefined {
                reason: String::from("no comparable produced a volatility"),
            };
        };

        let resolved = self
            .resolver
            .resolve(request.expected_term, request.valuation_date)
            .await;
        warnings.extend(
            resolved
                .failures
                .iter()
                .map(|failure| format!("{} treasury yield: {}", failure.tenor, failure.reason)),
        );
        let Some(risk_free_rate) = resolved.rate else {
            return Outcome::Undefined {
                reason: format!(
                    "risk-free rate for a {} year term is undefined",
                    request.expected_term
                ),
            };
        };

        let option_value = pricing::price(
            request.share_price,
            request.strike_price,
            request.expected_term,
            risk_free_rate,
            average_volatility,
        );
        if !option_value.is_finite() {
            return Outcome::Undefined {
                reason: String::from("option value is undefined for these inputs"),
            };
        }
        info!(
            "valuation {}: option value {option_value}, rate {risk_free_rate}, volatility {average_volatility}",
            request.valuation_id
        );

        let mut volatility_ids = Vec::with_capacity(average.results.len());
        for result in &average.results {
            match self.store.create_volatility_record(result) {
                Ok(id) => volatility_ids.push(id),
                Err(error) => {
                    let message = format!(
                        "failed to store volatility for {} ({}): {error}",
                        result.ticker, result.comp_id
                    );
                    warn!("{message}");
                    warnings.push(message);
                }
            }
        }

        let result = ValuationResult {
            option_value,
            risk_free_rate,
            average_volatility,
            volatility_ids,
        };
        if let Err(error) = self.store.complete_valuation(&request.record_id, &result) {
            warn!("failed to update valuation {}: {error}", request.valuation_id);
            return Outcome::Failed {
                error: error.to_string(),
            };
        }

        Outcome::Completed {
            option_value: result.option_value,
            risk_free_rate: result.risk_free_rate,
            average_volatility: result.average_volatility,
            volatility_ids: result.volatility_ids,
        }
    }

    /// Look up each comparable's ticker; unknown or invalid ones are dropped.
    fn resolve_comparables(
        &self,
        comp_ids: &[String],
        warnings: &mut Vec<String>,
    ) -> Vec<Comparable> {
        let mut comparables = Vec::with_capacity(comp_ids.len());
        for comp_id in comp_ids {
            let ticker = self
                .store
                .comparable_ticker(comp_id)
                .map_err(|error| error.to_string())
                .and_then(|raw| Symbol::parse(&raw).map_err(|error| error.to_string()));
            match ticker {
                Ok(ticker) => comparables.push(Comparable {
                    comp_id: comp_id.clone(),
                    ticker,
                }),
                Err(reason) => {
                    let failure = ComparableFailure {
                        comp_id: comp_id.clone(),
                        ticker: None,
                        reason,
                    };
                    let message = describe_failure(&failure);
                    warn!("{message}");
                    warnings.push(message);
                }
            }
        }
        comparables
    }
}

fn describe_failure(failure: &ComparableFailure) -> String {
    match &failure.ticker {
        Some(ticker) => format!(
            "comparable {} ({ticker}) dropped: {}",
            failure.comp_id, failure.reason
        ),
        None => format!("comparable {} dropped: {}", failure.comp_id, failure.reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::InMemoryMarketData;
    use crate::store::MemoryRecordStore;
    use crate::{PricePoint, YieldObservation};
    use time::macros::date;
    use time::Duration;

    fn record(record_id: &str, valuation_id: i64, comps: &[&str]) -> ValuationRecord {
        ValuationRecord {
            record_id: record_id.to_owned(),
            valuation_id,
            valuation_date: Some(String::from("2022-01-03")),
            expected_term: Some(0.05),
            share_price: Some(100.0),
            strike_price: Some(95.0),
            volatility_frequency: Some(String::from("daily")),
            public_comp_set: comps.iter().map(|comp| (*comp).to_owned()).collect(),
            option_value: None,
        }
    }

    fn market() -> InMemoryMarketData {
        let start = date!(2021 - 12 - 01);
        let closes = [100.0, 101.0, 99.5, 102.0, 103.5, 101.0, 104.0];
        let points = (0..40)
            .map(|day| PricePoint::new(start + Duration::days(day), Some(closes[day as usize % 7])))
            .collect();
        let as_of = date!(2022 - 01 - 03);
        let mut source = InMemoryMarketData::new()
            .with_prices(Symbol::parse("MSFT").expect("valid"), points);
        for ticker in ["^IRX", "^FVX", "^TNX", "^TYX"] {
            source = source.with_yields(
                Symbol::parse(ticker).expect("valid"),
                vec![YieldObservation::new(as_of, 1.0)],
            );
        }
        source
    }

    fn runner(store: Arc<MemoryRecordStore>) -> ValuationRunner {
        ValuationRunner::new(Arc::new(market()), store, RunnerConfig::default())
    }

    #[tokio::test]
    async fn completes_pending_record_and_links_volatilities() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert_comparable("comp1", "MSFT");
        store.insert_valuation(record("val1", 1, &["comp1"]));

        let report = runner(Arc::clone(&store)).run_batch().await.expect("batch");

        assert_eq!(report.summary.completed, 1);
        let Outcome::Completed {
            option_value,
            risk_free_rate,
            volatility_ids,
            ..
        } = &report.valuations[0].outcome
        else {
            panic!("expected completion, got {:?}", report.valuations[0].outcome);
        };
        assert_eq!(*risk_free_rate, 0.01);
        assert_eq!(volatility_ids.len(), 1);
        assert_eq!(
            store.valuation("val1").and_then(|r| r.option_value),
            Some(*option_value)
        );
    }

    #[tokio::test]
    async fn skips_valued_and_comparable_free_records() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut valued = record("val1", 1, &["comp1"]);
        valued.option_value = Some(3.2);
        store.insert_valuation(valued);
        store.insert_valuation(record("val2", 2, &[]));

        let report = runner(Arc::clone(&store)).run_batch().await.expect("batch");

        assert_eq!(report.summary.skipped, 2);
        assert_eq!(report.valuations[1].warnings.len(), 1);
        assert!(store.volatility_records().is_empty());
        assert!(store.result("val2").is_none());
    }

    #[tokio::test]
    async fn unknown_comparables_leave_the_record_undefined_and_pending() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert_valuation(record("val1", 1, &["missing"]));

        let report = runner(Arc::clone(&store)).run_batch().await.expect("batch");

        assert_eq!(report.summary.undefined, 1);
        assert!(report.valuations[0].warnings[0].contains("comparable missing dropped"));
        assert_eq!(store.valuation("val1").and_then(|r| r.option_value), None);
    }

    #[tokio::test]
    async fn processes_records_in_valuation_id_order() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert_valuation(record("b", 7, &[]));
        store.insert_valuation(record("a", 3, &[]));
        store.insert_valuation(record("c", 5, &[]));

        let report = runner(store).run_batch().await.expect("batch");
        let order = report
            .valuations
            .iter()
            .map(|report| report.valuation_id)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![3, 5, 7]);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let report = ValuationReport {
            record_id: String::from("val1"),
            valuation_id: 1,
            outcome: Outcome::Skipped {
                reason: String::from("already valued"),
            },
            warnings: Vec::new(),
        };
        let json = serde_json::to_value(&report).expect("serializable");
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "already valued");
        assert!(json.get("warnings").is_none());
    }
}
