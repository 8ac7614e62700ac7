use serde::{Deserialize, Serialize};
use time::Date;

use super::dates::{self, format_date};
use crate::{Symbol, ValidationError};

/// One session's adjusted close. `None` when the upstream had no value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(with = "dates::iso")]
    pub date: Date,
    pub adj_close: Option<f64>,
}

impl PricePoint {
    pub const fn new(date: Date, adj_close: Option<f64>) -> Self {
        Self { date, adj_close }
    }

    /// The close, if it can take part in a log return.
    pub fn usable_close(&self) -> Option<f64> {
        self.adj_close.filter(|value| value.is_finite() && *value > 0.0)
    }
}

/// Adjusted-close history for one ticker with strictly increasing dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: Symbol,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: Symbol, points: Vec<PricePoint>) -> Result<Self, ValidationError> {
        ensure_increasing(points.iter().map(|point| point.date))?;
        Ok(Self { symbol, points })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<Date> {
        self.points.first().map(|point| point.date)
    }

    pub fn last_date(&self) -> Option<Date> {
        self.points.last().map(|point| point.date)
    }
}

/// A quoted yield in percentage points (`1.60` means 1.6%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldObservation {
    #[serde(with = "dates::iso")]
    pub date: Date,
    pub percent_yield: f64,
}

impl YieldObservation {
    pub const fn new(date: Date, percent_yield: f64) -> Self {
        Self {
            date,
            percent_yield,
        }
    }
}

/// Yield history for one benchmark index ticker, ordered by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldSeries {
    pub symbol: Symbol,
    observations: Vec<YieldObservation>,
}

impl YieldSeries {
    pub fn new(
        symbol: Symbol,
        observations: Vec<YieldObservation>,
    ) -> Result<Self, ValidationError> {
        ensure_increasing(observations.iter().map(|obs| obs.date))?;
        for observation in &observations {
            if !observation.percent_yield.is_finite() {
                return Err(ValidationError::NonFiniteValue {
                    field: "percent_yield",
                });
            }
        }
        Ok(Self {
            symbol,
            observations,
        })
    }

    pub fn observations(&self) -> &[YieldObservation] {
        &self.observations
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observation on exactly `date`, else the latest one in the series.
    pub fn as_of(&self, date: Date) -> Option<YieldObservation> {
        self.observations
            .iter()
            .find(|obs| obs.date == date)
            .or_else(|| self.observations.last())
            .copied()
    }
}

fn ensure_increasing(dates: impl Iterator<Item = Date>) -> Result<(), ValidationError> {
    let mut previous: Option<Date> = None;
    for date in dates {
        if let Some(prev) = previous {
            if date <= prev {
                return Err(ValidationError::UnorderedSeries {
                    previous: format_date(prev),
                    next: format_date(date),
                });
            }
        }
        previous = Some(date);
    }
    Ok(())
}
