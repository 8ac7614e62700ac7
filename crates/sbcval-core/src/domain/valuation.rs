use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use super::dates::{self, parse_date};
use crate::{Symbol, ValidationError};

/// Sampling frequency used before computing log returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub const ALL: [Self; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Trading periods per year used for annualization.
    pub const fn periods_per_year(self) -> u32 {
        match self {
            Self::Daily => 252,
            Self::Weekly => 52,
            Self::Monthly => 12,
        }
    }

    pub fn annualization_factor(self) -> f64 {
        f64::from(self.periods_per_year()).sqrt()
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(ValidationError::InvalidFrequency {
                value: value.to_owned(),
            }),
        }
    }
}

/// A valuation row as the record store holds it. Everything the store cannot
/// guarantee is optional; [`ValuationRequest::try_from`] does the checking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValuationRecord {
    pub record_id: String,
    pub valuation_id: i64,
    pub valuation_date: Option<String>,
    pub expected_term: Option<f64>,
    pub share_price: Option<f64>,
    pub strike_price: Option<f64>,
    pub volatility_frequency: Option<String>,
    #[serde(default)]
    pub public_comp_set: Vec<String>,
    pub option_value: Option<f64>,
}

impl ValuationRecord {
    /// Records that already carry an option value are never valued again.
    pub fn is_valued(&self) -> bool {
        self.option_value.is_some()
    }
}

/// A validated request for one tranche valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub record_id: String,
    pub valuation_id: i64,
    #[serde(with = "dates::iso")]
    pub valuation_date: Date,
    pub expected_term: f64,
    pub share_price: f64,
    pub strike_price: f64,
    pub frequency: Frequency,
    pub comparables: Vec<String>,
}

impl TryFrom<&ValuationRecord> for ValuationRequest {
    type Error = ValidationError;

    fn try_from(record: &ValuationRecord) -> Result<Self, Self::Error> {
        let missing = |field| ValidationError::MissingField {
            valuation_id: record.valuation_id,
            field,
        };

        let valuation_date = record
            .valuation_date
            .as_deref()
            .ok_or_else(|| missing("valuation_date"))
            .and_then(parse_date)?;
        let expected_term = record.expected_term.ok_or_else(|| missing("expected_term"))?;
        let share_price = record.share_price.ok_or_else(|| missing("share_price"))?;
        let strike_price = record.strike_price.ok_or_else(|| missing("strike_price"))?;
        let frequency = record
            .volatility_frequency
            .as_deref()
            .ok_or_else(|| missing("volatility_frequency"))?
            .parse::<Frequency>()?;

        validate_finite("expected_term", expected_term)?;
        if expected_term <= 0.0 {
            return Err(ValidationError::NonPositiveValue {
                field: "expected_term",
            });
        }
        validate_finite("share_price", share_price)?;
        validate_finite("strike_price", strike_price)?;

        Ok(Self {
            record_id: record.record_id.clone(),
            valuation_id: record.valuation_id,
            valuation_date,
            expected_term,
            share_price,
            strike_price,
            frequency,
            comparables: record.public_comp_set.clone(),
        })
    }
}

/// Volatility computed for one comparable over a valuation's look-back window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityResult {
    pub ticker: Symbol,
    pub comp_id: String,
    pub volatility: f64,
    #[serde(with = "dates::iso")]
    pub window_start: Date,
    #[serde(with = "dates::iso")]
    pub window_end: Date,
}

/// Values written back to a valuation once it has been priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub option_value: f64,
    pub risk_free_rate: f64,
    pub average_volatility: f64,
    /// Store ids of the persisted [`VolatilityResult`] records.
    pub volatility_ids: Vec<String>,
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteValue { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn record() -> ValuationRecord {
        ValuationRecord {
            record_id: String::from("recVAL1"),
            valuation_id: 1,
            valuation_date: Some(String::from("2022-01-01")),
            expected_term: Some(3.0),
            share_price: Some(100.0),
            strike_price: Some(95.0),
            volatility_frequency: Some(String::from("Daily")),
            public_comp_set: vec![String::from("rec1")],
            option_value: None,
        }
    }

    #[test]
    fn parses_frequency_case_insensitively() {
        assert_eq!("Weekly".parse::<Frequency>(), Ok(Frequency::Weekly));
        assert_eq!(" monthly ".parse::<Frequency>(), Ok(Frequency::Monthly));
    }

    #[test]
    fn rejects_unknown_frequency() {
        let err = "hourly".parse::<Frequency>().expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidFrequency { .. }));
    }

    #[test]
    fn builds_request_from_complete_record() {
        let request = ValuationRequest::try_from(&record()).expect("valid record");
        assert_eq!(request.valuation_date, date!(2022 - 01 - 01));
        assert_eq!(request.frequency, Frequency::Daily);
        assert_eq!(request.comparables, vec![String::from("rec1")]);
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let mut incomplete = record();
        incomplete.valuation_date = None;
        let err = ValuationRequest::try_from(&incomplete).expect_err("must fail");
        assert_eq!(
            err,
            ValidationError::MissingField {
                valuation_id: 1,
                field: "valuation_date"
            }
        );
    }

    #[test]
    fn rejects_non_positive_term() {
        let mut zero_term = record();
        zero_term.expected_term = Some(0.0);
        let err = ValuationRequest::try_from(&zero_term).expect_err("must fail");
        assert!(matches!(err, ValidationError::NonPositiveValue { field: "expected_term" }));
    }
}
