//! Runner settings with environment overrides.

use serde::Serialize;

use crate::rates::DEFAULT_YIELD_LOOKBACK_DAYS;

pub const DEFAULT_DAYS_PER_YEAR: f64 = 365.0;

/// Longest yield lookback accepted from the environment.
pub const MAX_YIELD_LOOKBACK_DAYS: i64 = 366;

/// Settings for a valuation batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunnerConfig {
    /// Calendar days per year of expected term when sizing the price window.
    pub days_per_year: f64,
    /// Days before the valuation date the yield lookup may reach back.
    pub yield_lookback_days: i64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            days_per_year: DEFAULT_DAYS_PER_YEAR,
            yield_lookback_days: DEFAULT_YIELD_LOOKBACK_DAYS,
        }
    }
}

impl RunnerConfig {
    /// Defaults overridden by `SBCVAL_DAYS_PER_YEAR` and
    /// `SBCVAL_YIELD_LOOKBACK_DAYS`. Unparseable or out-of-range values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(days) = lookup("SBCVAL_DAYS_PER_YEAR")
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|days| days.is_finite() && *days > 0.0)
        {
            config.days_per_year = days;
        }
        if let Some(days) = lookup("SBCVAL_YIELD_LOOKBACK_DAYS")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|days| (0..=MAX_YIELD_LOOKBACK_DAYS).contains(days))
        {
            config.yield_lookback_days = days;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_calendar_year_and_one_week_lookback() {
        let config = RunnerConfig::from_lookup(|_| None);
        assert_eq!(config.days_per_year, 365.0);
        assert_eq!(config.yield_lookback_days, 7);
    }

    #[test]
    fn valid_overrides_apply_and_invalid_ones_are_ignored() {
        let config = RunnerConfig::from_lookup(|name| match name {
            "SBCVAL_DAYS_PER_YEAR" => Some(String::from("365.25")),
            "SBCVAL_YIELD_LOOKBACK_DAYS" => Some(String::from("-3")),
            _ => None,
        });
        assert_eq!(config.days_per_year, 365.25);
        assert_eq!(config.yield_lookback_days, 7);
    }

    #[test]
    fn lookback_beyond_a_year_is_ignored() {
        let config = RunnerConfig::from_lookup(|name| match name {
            "SBCVAL_YIELD_LOOKBACK_DAYS" => Some(i64::MAX.to_string()),
            _ => None,
        });
        assert_eq!(config.yield_lookback_days, DEFAULT_YIELD_LOOKBACK_DAYS);

        let config = RunnerConfig::from_lookup(|name| match name {
            "SBCVAL_YIELD_LOOKBACK_DAYS" => Some(String::from("366")),
            _ => None,
        });
        assert_eq!(config.yield_lookback_days, 366);
    }
}
