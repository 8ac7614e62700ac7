//! Black-Scholes value of a European call.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::PricingError;
use crate::numeric::round4;

/// Inputs to one call valuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CallInputs {
    pub spot: f64,
    pub strike: f64,
    pub term_years: f64,
    pub rate: f64,
    pub volatility: f64,
}

impl CallInputs {
    /// Rejects non-finite inputs and a negative volatility.
    ///
    /// Negative spot, strike or term are left to the caller, as in [`price`].
    pub fn validate(&self) -> Result<(), PricingError> {
        let fields = [
            ("spot", self.spot),
            ("strike", self.strike),
            ("term_years", self.term_years),
            ("rate", self.rate),
            ("volatility", self.volatility),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(PricingError::invalid_parameter(format!("{name} must be finite")));
        }
        if self.volatility < 0.0 {
            return Err(PricingError::invalid_parameter(
                "volatility must not be negative",
            ));
        }
        Ok(())
    }

    pub fn price(&self) -> Result<f64, PricingError> {
        self.validate()?;
        let value = price(
            self.spot,
            self.strike,
            self.term_years,
            self.rate,
            self.volatility,
        );
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PricingError::invalid_parameter(format!(
                "call value is undefined for {self:?}"
            )))
        }
    }
}

pub fn norm_cdf(x: f64) -> f64 {
    Normal::new(0.0, 1.0)
        .map(|normal| normal.cdf(x))
        .unwrap_or(f64::NAN)
}

/// Call value rounded to 4 decimals.
///
/// With zero volatility the value is the discounted intrinsic value
/// `max(spot - strike * e^(-rate * term), 0)`. Negative `spot`, `strike` or
/// `term_years` are not clamped; results for them are unspecified.
pub fn price(spot: f64, strike: f64, term_years: f64, rate: f64, volatility: f64) -> f64 {
    let discount = (-rate * term_years).exp();
    if volatility == 0.0 {
        return round4((spot - strike * discount).max(0.0));
    }

    let vol_sqrt_t = volatility * term_years.sqrt();
    let d1 = ((spot / strike).ln() + (rate + 0.5 * volatility * volatility) * term_years) / vol_sqrt_t;
    let d2 = d1 - vol_sqrt_t;

    round4(spot * norm_cdf(d1) - strike * discount * norm_cdf(d2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_the_money_call_is_positive_and_below_spot() {
        let value = price(100.0, 95.0, 1.0, 0.05, 0.2);
        assert!(value > 0.0);
        assert!(value < 100.0);
        // textbook value for these inputs
        assert!((value - 13.3465).abs() < 1e-3, "value={value}");
    }

    #[test]
    fn zero_volatility_is_discounted_intrinsic_value() {
        let expected = round4(100.0 - 90.0 * (-0.05_f64).exp());
        assert_eq!(price(100.0, 90.0, 1.0, 0.05, 0.0), expected);
        assert_eq!(price(80.0, 90.0, 1.0, 0.05, 0.0), 0.0);
    }

    #[test]
    fn value_is_rounded_to_four_places() {
        let value = price(100.0, 95.0, 3.0, 0.03, 0.25);
        assert_eq!(value, round4(value));
    }

    #[test]
    fn cdf_is_symmetric() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((norm_cdf(1.3) + norm_cdf(-1.3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn checked_price_rejects_bad_inputs() {
        let inputs = CallInputs {
            spot: 100.0,
            strike: 95.0,
            term_years: 1.0,
            rate: f64::NAN,
            volatility: 0.2,
        };
        assert!(matches!(
            inputs.price(),
            Err(PricingError::InvalidParameter(_))
        ));

        let negative_vol = CallInputs {
            rate: 0.05,
            volatility: -0.1,
            ..inputs
        };
        assert!(negative_vol.validate().is_err());

        let valid = CallInputs {
            rate: 0.05,
            ..inputs
        };
        assert_eq!(valid.price(), Ok(price(100.0, 95.0, 1.0, 0.05, 0.2)));
    }
}
