use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use log::{debug, warn};
use serde::Deserialize;
use time::{Date, Duration};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::domain::dates::{date_from_unix, unix_midnight};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::market_data::{check_window, no_data, MarketDataSource, SourceError, SourceFuture};
use crate::retry::RetryConfig;
use crate::{PricePoint, PriceSeries, Symbol, YieldObservation, YieldSeries};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Connection settings for the Yahoo chart API.
#[derive(Debug, Clone, PartialEq)]
pub struct YahooConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub requests_per_second: u32,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub auth: HttpAuth,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            timeout_ms: 10_000,
            requests_per_second: 4,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            auth: HttpAuth::None,
        }
    }
}

impl YahooConfig {
    /// Defaults overridden by `SBCVAL_YAHOO_BASE_URL`, `SBCVAL_TIMEOUT_MS`,
    /// `SBCVAL_YAHOO_RPS` and `YAHOO_COOKIE` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(base_url) = env_string("SBCVAL_YAHOO_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(timeout_ms) = env_string("SBCVAL_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.timeout_ms = timeout_ms;
        }
        if let Some(rps) = env_string("SBCVAL_YAHOO_RPS").and_then(|v| v.parse().ok()) {
            config.requests_per_second = rps;
        }
        if let Some(cookie) = env_string("YAHOO_COOKIE") {
            config.auth = HttpAuth::Cookie(cookie);
        }
        config
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Daily adjusted closes and treasury yield indices from the Yahoo chart API.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    config: YahooConfig,
    circuit_breaker: Arc<CircuitBreaker>,
    limiter: Arc<DirectRateLimiter>,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self::new(YahooConfig::default())
    }
}

impl YahooAdapter {
    pub fn new(config: YahooConfig) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()), config)
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, config: YahooConfig) -> Self {
        let burst = NonZeroU32::new(config.requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::new(config.circuit_breaker)),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(burst))),
            config,
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Chart URL covering `start..=end` in UTC days.
    pub fn chart_url(&self, ticker: &Symbol, start: Date, end: Date) -> String {
        let period2 = end
            .checked_add(Duration::days(1))
            .map(unix_midnight)
            .unwrap_or_else(|| unix_midnight(end));
        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&includeAdjustedClose=true",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(ticker.as_str()),
            unix_midnight(start),
            period2
        )
    }

    async fn fetch_chart(
        &self,
        ticker: &Symbol,
        start: Date,
        end: Date,
    ) -> Result<YahooChartResult, SourceError> {
        let url = self.chart_url(ticker, start, end);
        let mut attempt = 0;

        loop {
            let retry = match self.send(&url).await {
                Ok(response) => {
                    return parse_chart(&response.body, ticker, start, end);
                }
                Err((error, retryable)) => {
                    if !(retryable && self.config.retry.has_attempts_left(attempt)) {
                        return Err(error);
                    }
                    error
                }
            };

            let delay = self.config.retry.delay_for_attempt(attempt);
            warn!(
                "yahoo request for {ticker} failed ({retry}); retrying in {}ms",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One guarded request. The error side carries whether a retry is allowed.
    async fn send(&self, url: &str) -> Result<HttpResponse, (SourceError, bool)> {
        if !self.circuit_breaker.allow_request() {
            return Err((
                SourceError::unavailable("yahoo circuit breaker is open; skipping upstream call"),
                false,
            ));
        }
        self.limiter.until_ready().await;

        let request = HttpRequest::get(url)
            .with_header("referer", "https://finance.yahoo.com/")
            .with_auth(&self.config.auth)
            .with_timeout_ms(self.config.timeout_ms);
        debug!("GET {url}");

        let response = match self.http_client.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                self.circuit_breaker.record_failure();
                let retryable = self.config.retry.should_retry_error(&error);
                let source_error = if error.retryable() {
                    SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
                } else {
                    SourceError::internal(format!("yahoo transport error: {}", error.message()))
                };
                return Err((source_error, retryable));
            }
        };

        match response.status {
            200..=299 | 404 => {
                // 404 is Yahoo's answer for an unknown ticker, not an outage
                self.circuit_breaker.record_success();
                Ok(response)
            }
            429 => {
                self.circuit_breaker.record_failure();
                Err((
                    SourceError::rate_limited("yahoo rate limit exceeded (status 429)"),
                    self.config.retry.should_retry_status(429),
                ))
            }
            status if status >= 500 => {
                self.circuit_breaker.record_failure();
                Err((
                    SourceError::unavailable(format!("yahoo upstream returned status {status}")),
                    self.config.retry.should_retry_status(status),
                ))
            }
            status => {
                self.circuit_breaker.record_success();
                Err((
                    SourceError::invalid_request(format!("yahoo rejected request with status {status}")),
                    self.config.retry.should_retry_status(status),
                ))
            }
        }
    }
}

impl MarketDataSource for YahooAdapter {
    fn adjusted_close_prices<'a>(
        &'a self,
        ticker: &'a Symbol,
        start: Date,
        end: Date,
    ) -> SourceFuture<'a, PriceSeries> {
        Box::pin(async move {
            check_window(start, end)?;
            let chart = self.fetch_chart(ticker, start, end).await?;
            // Raw closes jump at splits and dividends, so a chart without
            // adjusted closes has no usable prices.
            let Some(closes) = chart
                .indicators
                .adjclose
                .first()
                .map(|adjusted| adjusted.adjclose.as_slice())
            else {
                return Err(no_data(ticker, start, end));
            };

            let points = daily_values(chart.timestamp.as_deref().unwrap_or_default(), closes)
                .into_iter()
                .filter(|(date, _)| *date >= start && *date <= end)
                .map(|(date, close)| PricePoint::new(date, close))
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
            let chart = self.fetch_chart(ticker, start, end).await?;
            let closes = chart
                .indicators
                .quote
                .first()
                .map(|quote| quote.close.as_slice())
                .unwrap_or_default();

            let observations = daily_values(chart.timestamp.as_deref().unwrap_or_default(), closes)
                .into_iter()
                .filter(|(date, _)| *date >= start && *date <= end)
                .filter_map(|(date, close)| {
                    close
                        .filter(|value| value.is_finite())
                        .map(|value| YieldObservation::new(date, value))
                })
                .collect::<Vec<_>>();

            if observations.is_empty() {
                return Err(no_data(ticker, start, end));
            }
            YieldSeries::new(ticker.clone(), observations)
                .map_err(|error| SourceError::internal(error.to_string()))
        })
    }
}

/// One value per UTC date. A later non-missing value for the same date
/// replaces an earlier one.
fn daily_values(timestamps: &[i64], values: &[Option<f64>]) -> BTreeMap<Date, Option<f64>> {
    let mut by_date = BTreeMap::new();
    for (index, &timestamp) in timestamps.iter().enumerate() {
        let Some(date) = date_from_unix(timestamp) else {
            continue;
        };
        let value = values.get(index).copied().flatten();
        by_date
            .entry(date)
            .and_modify(|existing: &mut Option<f64>| {
                if value.is_some() {
                    *existing = value;
                }
            })
            .or_insert(value);
    }
    by_date
}

fn parse_chart(
    body: &str,
    ticker: &Symbol,
    start: Date,
    end: Date,
) -> Result<YahooChartResult, SourceError> {
    let response: YahooChartResponse = serde_json::from_str(body)
        .map_err(|error| SourceError::internal(format!("failed to parse yahoo chart: {error}")))?;

    if let Some(error) = response.chart.error {
        return match error.code.as_str() {
            "Not Found" => Err(no_data(ticker, start, end)),
            _ => Err(SourceError::unavailable(format!(
                "yahoo chart API error for {ticker}: {} ({})",
                error.description.unwrap_or_default(),
                error.code
            ))),
        };
    }

    response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| no_data(ticker, start, end))
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooChartResult>>,
    error: Option<YahooChartError>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
    #[serde(default)]
    adjclose: Vec<YahooAdjClose>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}
