//! Historical volatility from adjusted closes.
//!
//! [`estimate`] is the pure part: resample a [`PriceSeries`] to the requested
//! [`Frequency`], take log returns between consecutive usable prices, and
//! annualize their sample standard deviation by `sqrt(periods per year)`.
//!
//! [`VolatilityEstimator`] wraps it with a [`MarketDataSource`] and averages
//! over a set of comparable companies. A comparable that cannot be fetched or
//! estimated is dropped from the average with a warning; when none succeed the
//! average is `None` rather than zero.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use time::{Date, Duration};

use crate::domain::dates::{self, format_date};
use crate::error::PricingError;
use crate::market_data::MarketDataSource;
use crate::numeric::{mean, round4, sample_std_dev};
use crate::{Frequency, PricePoint, PriceSeries, Symbol, VolatilityResult};

/// Inclusive date window a volatility is measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    #[serde(with = "dates::iso")]
    pub start: Date,
    #[serde(with = "dates::iso")]
    pub end: Date,
}

impl Window {
    pub const fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    /// `round(term_years * days_per_year)` calendar days ending at `end`.
    pub fn lookback(end: Date, term_years: f64, days_per_year: f64) -> Self {
        Self {
            start: dates::lookback_start(end, term_years, days_per_year),
            end,
        }
    }
}

/// Annualized volatility of `series` sampled at `frequency`, rounded to 4 places.
///
/// # Errors
///
/// [`PricingError::DataUnavailable`] when the series is empty or leaves fewer
/// than two log returns once missing prices are dropped.
pub fn estimate(series: &PriceSeries, frequency: Frequency) -> Result<f64, PricingError> {
    if series.is_empty() {
        return Err(PricingError::data_unavailable(format!(
            "no price data for {}",
            series.symbol
        )));
    }

    let prices = resample(series.points(), frequency);
    let returns = log_returns(&prices);
    let deviation = sample_std_dev(&returns).ok_or_else(|| {
        PricingError::data_unavailable(format!(
            "{} has {} usable {frequency} log return(s); at least 2 are required",
            series.symbol,
            returns.len()
        ))
    })?;

    Ok(round4(deviation * frequency.annualization_factor()))
}

/// Reduce a daily series to one value per sampling period.
///
/// Weekly periods end on Friday and monthly periods are calendar months. Every
/// period between the first and last observation gets a slot, holding the last
/// usable close inside it or `None` when the period had none.
pub fn resample(points: &[PricePoint], frequency: Frequency) -> Vec<Option<f64>> {
    if frequency == Frequency::Daily {
        return points.iter().map(PricePoint::usable_close).collect();
    }

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let first_period = period_index(first.date, frequency);
    let last_period = period_index(last.date, frequency);
    let slots = usize::try_from(last_period - first_period + 1).unwrap_or(0);

    let mut buckets = vec![None; slots];
    for point in points {
        if let Some(close) = point.usable_close() {
            let slot = (period_index(point.date, frequency) - first_period) as usize;
            buckets[slot] = Some(close);
        }
    }
    buckets
}

/// `ln(p_t / p_{t-1})` for each consecutive pair where both prices exist.
pub fn log_returns(prices: &[Option<f64>]) -> Vec<f64> {
    prices
        .windows(2)
        .filter_map(|pair| match (pair[0], pair[1]) {
            (Some(previous), Some(current)) => Some((current / previous).ln()),
            _ => None,
        })
        .collect()
}

/// Friday closing the week that contains `date`.
pub fn week_ending_friday(date: Date) -> Date {
    let weekday = i64::from(date.weekday().number_days_from_monday());
    let offset = (4 - weekday).rem_euclid(7);
    date.checked_add(Duration::days(offset)).unwrap_or(Date::MAX)
}

fn period_index(date: Date, frequency: Frequency) -> i64 {
    match frequency {
        Frequency::Daily => i64::from(date.to_julian_day()),
        Frequency::Weekly => i64::from(week_ending_friday(date).to_julian_day()).div_euclid(7),
        Frequency::Monthly => i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1,
    }
}

/// A comparable company resolved to its ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparable {
    pub comp_id: String,
    pub ticker: Symbol,
}

/// A comparable left out of the average, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparableFailure {
    pub comp_id: String,
    pub ticker: Option<Symbol>,
    pub reason: String,
}

/// Per-comparable volatilities plus their rounded mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageVolatility {
    pub results: Vec<VolatilityResult>,
    pub failures: Vec<ComparableFailure>,
    /// `None` when no comparable produced a volatility.
    pub average: Option<f64>,
}

impl AverageVolatility {
    pub fn from_parts(results: Vec<VolatilityResult>, failures: Vec<ComparableFailure>) -> Self {
        let values = results.iter().map(|result| result.volatility).collect::<Vec<_>>();
        Self {
            average: mean(&values).map(round4),
            results,
            failures,
        }
    }
}

/// Fetches comparable price histories and estimates their volatility.
#[derive(Clone)]
pub struct VolatilityEstimator {
    source: Arc<dyn MarketDataSource>,
}

impl VolatilityEstimator {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self { source }
    }

    /// Volatility of one ticker over `window`.
    pub async fn ticker_volatility(
        &self,
        ticker: &Symbol,
        window: Window,
        frequency: Frequency,
    ) -> Result<f64, PricingError> {
        let series = self
            .source
            .adjusted_close_prices(ticker, window.start, window.end)
            .await?;
        estimate(&series, frequency)
    }

    /// Estimate every comparable independently and average the successes.
    pub async fn average_volatility(
        &self,
        comparables: &[Comparable],
        window: Window,
        frequency: Frequency,
    ) -> AverageVolatility {
        let mut results = Vec::with_capacity(comparables.len());
        let mut failures = Vec::new();

        for comparable in comparables {
            match self
                .ticker_volatility(&comparable.ticker, window, frequency)
                .await
            {
                Ok(volatility) => {
                    debug!(
                        "volatility for {} ({}): {volatility}",
                        comparable.ticker, comparable.comp_id
                    );
                    results.push(VolatilityResult {
                        ticker: comparable.ticker.clone(),
                        comp_id: comparable.comp_id.clone(),
                        volatility,
                        window_start: window.start,
                        window_end: window.end,
                    });
                }
                Err(error) => {
                    warn!(
                        "dropping {} from {} to {}: {error}",
                        comparable.ticker,
                        format_date(window.start),
                        format_date(window.end)
                    );
                    failures.push(ComparableFailure {
                        comp_id: comparable.comp_id.clone(),
                        ticker: Some(comparable.ticker.clone()),
                        reason: error.to_string(),
                    });
                }
            }
        }

        AverageVolatility::from_parts(results, failures)
    }
}
