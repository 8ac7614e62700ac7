//! Small numeric helpers shared by the estimator, resolver and pricer.

/// Round half away from zero to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator). Undefined below two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sum_sq = values
        .iter()
        .map(|value| {
            let dev = value - mean;
            dev * dev
        })
        .sum::<f64>();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_four_places() {
        assert_eq!(round4(0.016_000_000_1), 0.016);
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round4(-0.000_04), -0.0);
    }

    #[test]
    fn sample_std_dev_uses_bessel_correction() {
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).expect("defined");
        assert!((sd - 2.138_089_935).abs() < 1e-9);
    }

    #[test]
    fn sample_std_dev_is_undefined_for_one_value() {
        assert_eq!(sample_std_dev(&[0.01]), None);
        assert_eq!(mean(&[]), None);
    }
}
