//! Term-matched risk-free rate from the treasury benchmark ladder.
//!
//! Yields are looked up for four fixed tenors, converted from percentage points
//! to decimals, and laid out as control points on a [`YieldCurve`]. A term is
//! priced by linear interpolation inside the ladder and by extrapolating the
//! 10y to 30y slope beyond ten years. A tenor that could not be fetched leaves
//! a hole in the curve; terms whose bracket needs it resolve to `None`.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use time::Date;

use crate::domain::dates::{self, format_date};
use crate::error::PricingError;
use crate::market_data::MarketDataSource;
use crate::numeric::round4;
use crate::Symbol;

/// Lookback the source is asked to cover when fetching a tenor yield.
pub const DEFAULT_YIELD_LOOKBACK_DAYS: i64 = 7;

/// Benchmark maturities, shortest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Tenor {
    #[serde(rename = "1-year")]
    OneYear,
    #[serde(rename = "5-year")]
    FiveYear,
    #[serde(rename = "10-year")]
    TenYear,
    #[serde(rename = "30-year")]
    ThirtyYear,
}

impl Tenor {
    pub const ALL: [Self; 4] = [Self::OneYear, Self::FiveYear, Self::TenYear, Self::ThirtyYear];

    pub const fn years(self) -> f64 {
        match self {
            Self::OneYear => 1.0,
            Self::FiveYear => 5.0,
            Self::TenYear => 10.0,
            Self::ThirtyYear => 30.0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::OneYear => "1-year",
            Self::FiveYear => "5-year",
            Self::TenYear => "10-year",
            Self::ThirtyYear => "30-year",
        }
    }

    /// Yahoo index quoting this tenor's yield.
    pub const fn ticker(self) -> &'static str {
        match self {
            Self::OneYear => "^IRX",
            Self::FiveYear => "^FVX",
            Self::TenYear => "^TNX",
            Self::ThirtyYear => "^TYX",
        }
    }

    pub fn symbol(self) -> Result<Symbol, PricingError> {
        Ok(Symbol::parse(self.ticker())?)
    }
}

impl std::fmt::Display for Tenor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One tenor's yield as a decimal (`0.016`), with the date it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YieldPoint {
    pub tenor: Tenor,
    #[serde(rename = "yield")]
    pub rate: f64,
    #[serde(with = "dates::iso")]
    pub date: Date,
}

/// Control points `(tenor years, rate)` ordered by tenor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YieldCurve {
    points: Vec<YieldPoint>,
}

impl YieldCurve {
    pub fn new(mut points: Vec<YieldPoint>) -> Self {
        points.sort_by_key(|point| point.tenor);
        points.dedup_by_key(|point| point.tenor);
        Self { points }
    }

    pub fn points(&self) -> &[YieldPoint] {
        &self.points
    }

    pub fn rate(&self, tenor: Tenor) -> Option<f64> {
        self.points
            .iter()
            .find(|point| point.tenor == tenor)
            .map(|point| point.rate)
    }

    /// Rate for `term_years`, or `None` when a tenor the bracket needs is missing.
    pub fn rate_for_term(&self, term_years: f64) -> Option<f64> {
        if !term_years.is_finite() {
            return None;
        }
        match bracket(term_years) {
            (low, None) => self.rate(low),
            (low, Some(high)) => {
                let low_rate = self.rate(low)?;
                let high_rate = self.rate(high)?;
                Some(along_segment(
                    (low.years(), low_rate),
                    (high.years(), high_rate),
                    term_years,
                ))
            }
        }
    }
}

/// Tenors whose segment covers `term_years`. Terms past the last knot keep
/// using the final segment.
fn bracket(term_years: f64) -> (Tenor, Option<Tenor>) {
    if term_years <= Tenor::OneYear.years() {
        return (Tenor::OneYear, None);
    }
    Tenor::ALL
        .windows(2)
        .find(|pair| term_years <= pair[1].years())
        .map(|pair| (pair[0], Some(pair[1])))
        .unwrap_or((Tenor::TenYear, Some(Tenor::ThirtyYear)))
}

fn along_segment(low: (f64, f64), high: (f64, f64), x: f64) -> f64 {
    let slope = (high.1 - low.1) / (high.0 - low.0);
    low.1 + slope * (x - low.0)
}

/// A tenor left off the curve, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenorFailure {
    pub tenor: Tenor,
    pub reason: String,
}

/// Outcome of [`RateResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRate {
    pub term_years: f64,
    #[serde(with = "dates::iso")]
    pub as_of: Date,
    /// `None` when the curve has a hole in the bracket for `term_years`.
    pub rate: Option<f64>,
    pub points: Vec<YieldPoint>,
    pub failures: Vec<TenorFailure>,
}

/// Looks up tenor yields through a [`MarketDataSource`] and builds the curve.
#[derive(Clone)]
pub struct RateResolver {
    source: Arc<dyn MarketDataSource>,
    lookback_days: i64,
}

impl RateResolver {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            lookback_days: DEFAULT_YIELD_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback_days(mut self, lookback_days: i64) -> Self {
        self.lookback_days = lookback_days.max(0);
        self
    }

    /// Yield for one tenor as of `as_of`, as a decimal rounded to 4 places.
    ///
    /// The source is asked for `[as_of - lookback, as_of]`; the observation on
    /// `as_of` wins, otherwise the latest one returned.
    pub async fn tenor_yield(&self, tenor: Tenor, as_of: Date) -> Result<YieldPoint, PricingError> {
        let ticker = tenor.symbol()?;
        let start = dates::days_before(as_of, self.lookback_days);
        let series = self.source.yield_series(&ticker, start, as_of).await?;
        let observation = series.as_of(as_of).ok_or_else(|| {
            PricingError::data_unavailable(format!(
                "no data found for {ticker} around {}",
                format_date(as_of)
            ))
        })?;

        Ok(YieldPoint {
            tenor,
            rate: round4(observation.percent_yield / 100.0),
            date: observation.date,
        })
    }

    /// Fetch every tenor; failures are logged and left off the curve.
    pub async fn curve(&self, as_of: Date) -> (YieldCurve, Vec<TenorFailure>) {
        let mut points = Vec::with_capacity(Tenor::ALL.len());
        let mut failures = Vec::new();

        for tenor in Tenor::ALL {
            match self.tenor_yield(tenor, as_of).await {
                Ok(point) => {
                    debug!("{tenor} treasury yield as of {}: {}", format_date(as_of), point.rate);
                    points.push(point);
                }
                Err(error) => {
                    warn!("error fetching {tenor} treasury yield: {error}");
                    failures.push(TenorFailure {
                        tenor,
                        reason: error.to_string(),
                    });
                }
            }
        }

        (YieldCurve::new(points), failures)
    }

    /// Risk-free rate matched to `term_years` as of `as_of`.
    pub async fn resolve(&self, term_years: f64, as_of: Date) -> ResolvedRate {
        let (curve, failures) = self.curve(as_of).await;
        let rate = curve.rate_for_term(term_years);
        if rate.is_none() {
            warn!(
                "risk-free rate for a {term_years} year term as of {} is undefined",
                format_date(as_of)
            );
        }

        ResolvedRate {
            term_years,
            as_of,
            rate,
            points: curve.points().to_vec(),
            failures,
        }
    }
}
