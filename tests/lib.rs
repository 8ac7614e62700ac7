//! Shared fixtures for the behaviour tests.

pub use std::sync::Arc;

use sbcval_core::{
    InMemoryMarketData, PricePoint, Symbol, Tenor, ValuationRecord, YieldObservation,
};
use time::{Date, Duration};

pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

/// One close per calendar day from `start` to `end`, alternating between
/// `base` and `base * (1 + swing)`.
pub fn zigzag_prices(start: Date, end: Date, base: f64, swing: f64) -> Vec<PricePoint> {
    let mut points = Vec::new();
    let mut date = start;
    let mut up = false;
    while date <= end {
        let close = if up { base * (1.0 + swing) } else { base };
        points.push(PricePoint::new(date, Some(close)));
        up = !up;
        date += Duration::days(1);
    }
    points
}

/// Every tenor in `tenors` quoted at `percent` on `date`.
pub fn quote_tenors(
    source: InMemoryMarketData,
    tenors: &[Tenor],
    date: Date,
    percent: f64,
) -> InMemoryMarketData {
    tenors.iter().fold(source, |source, tenor| {
        source.with_yields(
            symbol(tenor.ticker()),
            vec![YieldObservation::new(date, percent)],
        )
    })
}

pub fn pending_record(record_id: &str, valuation_id: i64, comps: &[&str]) -> ValuationRecord {
    ValuationRecord {
        record_id: record_id.to_owned(),
        valuation_id,
        valuation_date: Some(String::from("2022-01-01")),
        expected_term: Some(3.0),
        share_price: Some(100.0),
        strike_price: Some(95.0),
        volatility_frequency: Some(String::from("Daily")),
        public_comp_set: comps.iter().map(|comp| (*comp).to_owned()).collect(),
        option_value: None,
    }
}
