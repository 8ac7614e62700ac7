//! # sbcval Core
//!
//! Fair-value pricing of stock compensation tranches.
//!
//! ## Overview
//!
//! A valuation is priced as a European call. Its inputs come from three
//! stages, leaves first:
//!
//! - **Volatility estimation**: adjusted closes of comparable companies are
//!   resampled, turned into log returns and annualized, then averaged
//! - **Risk-free rate resolution**: treasury yields at the 1, 5, 10 and 30 year
//!   tenors are interpolated to the expected term
//! - **Option pricing**: Black-Scholes with the averaged volatility and rate
//!
//! [`ValuationRunner`] strings them together for every pending record of a
//! [`RecordStore`].
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo chart adapter and an offline synthetic source |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`config`] | Runner settings |
//! | [`domain`] | Symbols, series, valuation records and results |
//! | [`error`] | Validation and pricing errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`market_data`] | Market-data source trait and in-memory source |
//! | [`pricing`] | Black-Scholes call value |
//! | [`rates`] | Tenor yields and the term-matched rate |
//! | [`retry`] | Backoff policy |
//! | [`store`] | Record-store trait and in-memory store |
//! | [`valuation`] | Batch orchestration |
//! | [`volatility`] | Historical volatility |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sbcval_core::{MemoryRecordStore, RunnerConfig, ValuationRunner, YahooAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryRecordStore::new());
//!     let runner = ValuationRunner::new(
//!         Arc::new(YahooAdapter::default()),
//!         store,
//!         RunnerConfig::default(),
//!     );
//!     let report = runner.run_batch().await?;
//!     println!("{} valued", report.summary.completed);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Stage failures surface as [`PricingError`]. Per-comparable and per-tenor
//! failures never abort a valuation; they are logged, reported and excluded,
//! and an aggregate with nothing left to aggregate is `None`, never zero.

pub mod adapters;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod market_data;
mod numeric;
pub mod pricing;
pub mod rates;
pub mod retry;
pub mod store;
pub mod valuation;
pub mod volatility;

pub use adapters::{SyntheticMarketData, YahooAdapter, YahooConfig};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::RunnerConfig;
pub use domain::{
    Frequency, PricePoint, PriceSeries, Symbol, ValuationRecord, ValuationRequest,
    ValuationResult, VolatilityResult, YieldObservation, YieldSeries,
};
pub use error::{PricingError, ValidationError};
pub use http_client::{HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use market_data::{InMemoryMarketData, MarketDataSource, SourceError, SourceErrorKind};
pub use numeric::round4;
pub use pricing::{price, CallInputs};
pub use rates::{RateResolver, ResolvedRate, Tenor, YieldCurve, YieldPoint};
pub use retry::{Backoff, RetryConfig};
pub use store::{MemoryRecordStore, RecordStore, StoreError};
pub use valuation::{BatchReport, BatchSummary, Outcome, ValuationReport, ValuationRunner};
pub use volatility::{estimate, AverageVolatility, Comparable, VolatilityEstimator, Window};
