//! Market-data source contract and an in-memory implementation.
//!
//! The pipeline needs two series from the outside world: adjusted closes for
//! comparable companies and quoted yields for the treasury benchmark indices.
//! Both are fetched through [`MarketDataSource`], injected into the estimator,
//! resolver and runner as `Arc<dyn MarketDataSource>`.
//!
//! | Method | Response | Used by |
//! |--------|----------|---------|
//! | [`adjusted_close_prices`](MarketDataSource::adjusted_close_prices) | [`PriceSeries`] | volatility estimator |
//! | [`yield_series`](MarketDataSource::yield_series) | [`YieldSeries`] | rate resolver |

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use time::Date;

use crate::domain::dates::format_date;
use crate::{PricePoint, PriceSeries, Symbol, YieldObservation, YieldSeries};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The upstream answered but had nothing for the requested window.
    NoData,
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured market-data error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn no_data(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NoData,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::NoData => "source.no_data",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Market-data contract. Both windows are inclusive of `start` and `end`.
///
/// Implementations return [`SourceErrorKind::NoData`] instead of an empty
/// series, and must be `Send + Sync` since one instance is shared by every
/// stage of a batch.
pub trait MarketDataSource: Send + Sync {
    /// Daily adjusted closes for `ticker`.
    fn adjusted_close_prices<'a>(
        &'a self,
        ticker: &'a Symbol,
        start: Date,
        end: Date,
    ) -> SourceFuture<'a, PriceSeries>;

    /// Quoted yields, in percentage points, for a benchmark index ticker.
    fn yield_series<'a>(
        &'a self,
        ticker: &'a Symbol,
        start: Date,
        end: Date,
    ) -> SourceFuture<'a, YieldSeries>;
}

/// Deterministic market data held in memory, for offline runs and tests.
///
/// Prices and yields are filtered to the requested window.
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    prices: RwLock<HashMap<Symbol, Vec<PricePoint>>>,
    yields: RwLock<HashMap<Symbol, Vec<YieldObservation>>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(self, ticker: Symbol, points: Vec<PricePoint>) -> Self {
        self.insert_prices(ticker, points);
        self
    }

    pub fn with_yields(self, ticker: Symbol, observations: Vec<YieldObservation>) -> Self {
        self.insert_yields(ticker, observations);
        self
    }

    pub fn insert_prices(&self, ticker: Symbol, mut points: Vec<PricePoint>) {
        points.sort_by_key(|point| point.date);
        points.dedup_by_key(|point| point.date);
        self.prices
            .write()
            .expect("price fixture lock is not poisoned")
            .insert(ticker, points);
    }

    pub fn insert_yields(&self, ticker: Symbol, mut observations: Vec<YieldObservation>) {
        observations.sort_by_key(|obs| obs.date);
        observations.dedup_by_key(|obs| obs.date);
        self.yields
            .write()
            .expect("yield fixture lock is not poisoned")
            .insert(ticker, observations);
    }
}

impl MarketDataSource for InMemoryMarketData {
    fn adjusted_close_prices<'a>(
        &'a self,
        ticker: &'a Symbol,
        start: Date,
        end: Date,
    ) -> SourceFuture<'a, PriceSeries> {
        Box::pin(async move {
            check_window(start, end)?;
            let points = self
                .prices
                .read()
                .expect("price fixture lock is not poisoned")
                .get(ticker)
                .map(|points| {
                    points
                        .iter()
                        .filter(|point| point.date >= start && point.date <= end)
                        .copied()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            if points.is_empty() {
                return Err(no_data(ticker, start, end));
            }
            PriceSeries::new(ticker.clone(), points)
                .map_err(|error| SourceError::internal(error.to_string()))
        })
    }

    fn yield_series<'a>(
        &'a self,
        ticker: &'a Symbol,
        start: Date,
        end: Date,
    ) -> SourceFuture<'a, YieldSeries> {
        Box::pin(async move {
            check_window(start, end)?;
            let observations = self
                .yields
                .read()
                .expect("yield fixture lock is not poisoned")
                .get(ticker)
                .map(|observations| {
                    observations
                        .iter()
                        .filter(|obs| obs.date >= start && obs.date <= end)
                        .copied()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            if observations.is_empty() {
                return Err(no_data(ticker, start, end));
            }
            YieldSeries::new(ticker.clone(), observations)
                .map_err(|error| SourceError::internal(error.to_string()))
        })
    }
}

pub(crate) fn check_window(start: Date, end: Date) -> Result<(), SourceError> {
    if start > end {
        return Err(SourceError::invalid_request(format!(
            "window start {} is after end {}",
            format_date(start),
            format_date(end)
        )));
    }
    Ok(())
}

pub(crate) fn no_data(ticker: &Symbol, start: Date, end: Date) -> SourceError {
    SourceError::no_data(format!(
        "no data found for {ticker} from {} to {}",
        format_date(start),
        format_date(end)
    ))
}
