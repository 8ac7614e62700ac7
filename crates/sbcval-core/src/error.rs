use thiserror::Error;

use crate::market_data::{SourceError, SourceErrorKind};

/// Validation and contract errors raised while building domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter, digit or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("date must be formatted as YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },

    #[error("invalid volatility frequency '{value}', expected one of daily, weekly, monthly")]
    InvalidFrequency { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be greater than zero")]
    NonPositiveValue { field: &'static str },

    #[error("series dates must be strictly increasing ({previous} then {next})")]
    UnorderedSeries { previous: String, next: String },

    #[error("valuation {valuation_id} is missing required field '{field}'")]
    MissingField {
        valuation_id: i64,
        field: &'static str,
    },
}

/// Failure of one pipeline stage: the estimator, the resolver or the pricer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PricingError {
    /// No price or yield data in the requested window, or too little of it.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Unsupported frequency value or out-of-domain numeric input.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl PricingError {
    pub fn data_unavailable(message: impl Into<String>) -> Self {
        Self::DataUnavailable(message.into())
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::DataUnavailable(_) => "pricing.data_unavailable",
            Self::InvalidParameter(_) => "pricing.invalid_parameter",
        }
    }
}

impl From<ValidationError> for PricingError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidParameter(value.to_string())
    }
}

impl From<SourceError> for PricingError {
    fn from(value: SourceError) -> Self {
        match value.kind() {
            SourceErrorKind::InvalidRequest => Self::InvalidParameter(value.to_string()),
            SourceErrorKind::NoData
            | SourceErrorKind::Unavailable
            | SourceErrorKind::RateLimited
            | SourceErrorKind::Internal => Self::DataUnavailable(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_map_to_pricing_kinds() {
        let missing: PricingError = SourceError::no_data("no rows for ^TNX").into();
        assert!(matches!(missing, PricingError::DataUnavailable(_)));

        let rejected: PricingError = SourceError::invalid_request("start after end").into();
        assert!(matches!(rejected, PricingError::InvalidParameter(_)));
    }

    #[test]
    fn frequency_validation_becomes_invalid_parameter() {
        let error: PricingError = ValidationError::InvalidFrequency {
            value: String::from("hourly"),
        }
        .into();
        assert_eq!(error.code(), "pricing.invalid_parameter");
        assert!(error.to_string().contains("hourly"));
    }
}
