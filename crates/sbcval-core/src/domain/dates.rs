//! Calendar-date helpers. Valuation, window and observation dates are plain
//! `YYYY-MM-DD` dates without a time component.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::ValidationError;

const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<Date, ValidationError> {
    Date::parse(input.trim(), ISO_DATE).map_err(|_| ValidationError::InvalidDate {
        value: input.to_owned(),
    })
}

pub fn format_date(date: Date) -> String {
    date.format(ISO_DATE)
        .unwrap_or_else(|_| String::from("<unformattable>"))
}

/// UTC calendar date of a unix timestamp.
pub fn date_from_unix(seconds: i64) -> Option<Date> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .map(OffsetDateTime::date)
}

/// Unix timestamp at UTC midnight of `date`.
pub fn unix_midnight(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp()
}

/// `days` calendar days before `end`, saturating at `Date::MIN`. Negative
/// counts are treated as zero.
pub fn days_before(end: Date, days: i64) -> Date {
    let julian = i64::from(end.to_julian_day()).saturating_sub(days.max(0));
    i32::try_from(julian)
        .ok()
        .and_then(|day| Date::from_julian_day(day).ok())
        .unwrap_or(Date::MIN)
}

/// Start of a look-back window of `round(years * days_per_year)` calendar days
/// ending at `end`. Windows reaching past the calendar start at `Date::MIN`.
pub fn lookback_start(end: Date, years: f64, days_per_year: f64) -> Date {
    // `as` saturates at the i64 bounds
    let days = (years * days_per_year).round() as i64;
    days_before(end, days)
}

/// Serde adapter for `Date` fields rendered as `YYYY-MM-DD`.
pub mod iso {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::parse_date(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_date("2022-01-01").expect("date"), date!(2022 - 01 - 01));
        assert_eq!(format_date(date!(2021 - 12 - 31)), "2021-12-31");
    }

    #[test]
    fn rejects_impossible_month() {
        let err = parse_date("2022-13-01").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }

    #[test]
    fn lookback_rounds_fractional_years_to_days() {
        let end = date!(2022 - 01 - 01);
        assert_eq!(lookback_start(end, 1.0, 365.0), date!(2021 - 01 - 01));
        // 0.5 * 365 = 182.5 rounds away from zero
        assert_eq!(lookback_start(end, 0.5, 365.0), date!(2021 - 07 - 02));
    }

    #[test]
    fn lookback_past_the_calendar_start_saturates() {
        let end = date!(2022 - 01 - 01);
        assert_eq!(lookback_start(end, 1e15, 365.0), Date::MIN);
        assert_eq!(lookback_start(end, f64::MAX, 365.0), Date::MIN);
        assert_eq!(days_before(end, i64::MAX), Date::MIN);
        assert_eq!(days_before(end, -3), end);
    }

    #[test]
    fn unix_round_trip_lands_on_same_date() {
        let day = date!(2023 - 06 - 30);
        assert_eq!(date_from_unix(unix_midnight(day) + 14 * 3600), Some(day));
    }
}
