use time::{Date, Duration, Weekday};

use crate::market_data::{check_window, no_data, MarketDataSource, SourceError, SourceFuture};
use crate::{PricePoint, PriceSeries, Symbol, YieldObservation, YieldSeries};

/// Offline source producing deterministic weekday data for any ticker.
///
/// Values depend only on the ticker and the date, so overlapping windows agree
/// with each other. Used by `--mock` runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticMarketData;

impl SyntheticMarketData {
    pub fn close(ticker: &Symbol, date: Date) -> f64 {
        let seed = symbol_seed(ticker);
        let base = 40.0 + (seed % 160) as f64;
        let day = f64::from(date.to_julian_day());
        let cycle = 0.08 * (day / 45.0 + (seed % 7) as f64).sin();
        base * (cycle + 0.02 * day_noise(seed, date)).exp()
    }

    /// Quoted yield in percentage points.
    pub fn percent_yield(ticker: &Symbol, date: Date) -> f64 {
        let seed = symbol_seed(ticker);
        let level = 1.0 + (seed % 300) as f64 / 100.0;
        let value = level + 0.05 * day_noise(seed, date);
        (value * 1_000.0).round() / 1_000.0
    }
}

impl MarketDataSource for SyntheticMarketData {
    fn adjusted_close_prices<'a>(
        &'a self,
        ticker: &'a Symbol,
        start: Date,
        end: Date,
    ) -> SourceFuture<'a, PriceSeries> {
        Box::pin(async move {
            check_window(start, end)?;
            let points = weekdays(start, end)
                .map(|date| PricePoint::new(date, Some(Self::close(ticker, date))))
                .collect::<Vec<_>>();
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
            let observations = weekdays(start, end)
                .map(|date| YieldObservation::new(date, Self::percent_yield(ticker, date)))
                .collect::<Vec<_>>();
            if observations.is_empty() {
                return Err(no_data(ticker, start, end));
            }
            YieldSeries::new(ticker.clone(), observations)
                .map_err(|error| SourceError::internal(error.to_string()))
        })
    }
}

fn weekdays(start: Date, end: Date) -> impl Iterator<Item = Date> {
    std::iter::successors(Some(start), |date| date.checked_add(Duration::days(1)))
        .take_while(move |date| *date <= end)
        .filter(|date| !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday))
}

/// Uniform value in `[-1, 1)` fixed by the seed and the date.
fn day_noise(seed: u64, date: Date) -> f64 {
    let day = u64::from(date.to_julian_day().unsigned_abs());
    let mut rng = fastrand::Rng::with_seed(seed ^ day.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    rng.f64() * 2.0 - 1.0
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}
