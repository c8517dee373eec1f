//! Calendar encodings of a daily index
//!
//! Integer calendar fields let tree models split on season directly; the
//! sine/cosine pair encodes the position in a 365-step year so that
//! 31 December and 1 January end up close together.

use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;

/// Length of the annual cycle used by the periodic encodings
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Day of week, Monday = 0 through Sunday = 6
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

/// Month of year, 1 through 12
pub fn month(date: NaiveDate) -> u32 {
    date.month()
}

/// Day of year, 1 through 366
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// `sin(2π·i/365)` for zero-based row position `i`
pub fn annual_sin(position: usize) -> f64 {
    (2.0 * PI * position as f64 / DAYS_PER_YEAR).sin()
}

/// `cos(2π·i/365)` for zero-based row position `i`
pub fn annual_cos(position: usize) -> f64 {
    (2.0 * PI * position as f64 / DAYS_PER_YEAR).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn integer_fields() {
        // 2016-01-04 was a Monday
        assert_eq!(day_of_week(date(2016, 1, 4)), 0);
        assert_eq!(day_of_week(date(2016, 1, 10)), 6);
        assert_eq!(month(date(2016, 12, 31)), 12);
        assert_eq!(day_of_year(date(2016, 12, 31)), 366);
        assert_eq!(day_of_year(date(2017, 1, 1)), 1);
    }

    #[test]
    fn periodic_encoding_wraps_after_a_year() {
        assert_abs_diff_eq!(annual_sin(0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(annual_cos(0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(annual_sin(365), annual_sin(0), epsilon = 1e-9);
        assert_abs_diff_eq!(annual_cos(365), annual_cos(0), epsilon = 1e-9);
        assert!(annual_sin(91) > 0.99);
    }
}
