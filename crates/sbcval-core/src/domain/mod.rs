//! # Domain Models
//!
//! Strongly-typed values flowing through the valuation pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Normalized ticker (`MSFT`, `^TNX`) |
//! | [`PriceSeries`] | Adjusted closes for one ticker, strictly increasing dates |
//! | [`YieldSeries`] | Quoted yields (percentage points) for one benchmark index |
//! | [`Frequency`] | Volatility sampling frequency |
//! | [`ValuationRecord`] | Raw valuation row as the record store holds it |
//! | [`ValuationRequest`] | Validated valuation input |
//! | [`VolatilityResult`] | Per-comparable volatility output |
//! | [`ValuationResult`] | Option value, rate and volatility links written back |
//!
//! Construction validates invariants; a [`ValuationRecord`] only becomes a
//! [`ValuationRequest`] once every required field is present and in range.

pub mod dates;
mod series;
mod symbol;
mod valuation;

pub use series::{PricePoint, PriceSeries, YieldObservation, YieldSeries};
pub use symbol::Symbol;
pub use valuation::{
    Frequency, ValuationRecord, ValuationRequest, ValuationResult, VolatilityResult,
};
