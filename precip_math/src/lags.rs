//! Lagged copies of a series
//!
//! A lag of `k` shifts the series forward by `k` steps, so position `i`
//! holds the value observed at `i - k`. The first `k` positions have no
//! history and are undefined.

use crate::{MathError, Result};

/// Shift `series` by `k` steps.
///
/// # Examples
///
/// ```
/// use precip_math::lags::lag;
///
/// let lagged = lag(&[1.0, 2.0, 3.0], 1).unwrap();
/// assert_eq!(lagged, vec![None, Some(1.0), Some(2.0)]);
/// ```
pub fn lag(series: &[f64], k: usize) -> Result<Vec<Option<f64>>> {
    if k == 0 {
        return Err(MathError::InvalidInput(
            "Lag offset must be greater than zero".to_string(),
        ));
    }

    Ok((0..series.len())
        .map(|i| if i >= k { Some(series[i - k]) } else { None })
        .collect())
}

/// Lag every offset in `offsets`, returning one column per offset in order.
pub fn lags(series: &[f64], offsets: &[usize]) -> Result<Vec<Vec<Option<f64>>>> {
    offsets.iter().map(|&k| lag(series, k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(7)]
    fn lag_matches_shifted_index(#[case] k: usize) {
        let series: Vec<f64> = (0..20).map(|v| v as f64 * 1.5).collect();
        let lagged = lag(&series, k).unwrap();

        assert_eq!(lagged.len(), series.len());
        for (i, value) in lagged.iter().enumerate() {
            if i < k {
                assert!(value.is_none());
            } else {
                assert_eq!(*value, Some(series[i - k]));
            }
        }
    }

    #[test]
    fn lag_longer_than_series_is_all_undefined() {
        let lagged = lag(&[1.0, 2.0], 5).unwrap();
        assert!(lagged.iter().all(Option::is_none));
    }

    #[test]
    fn zero_lag_is_rejected() {
        assert!(matches!(lag(&[1.0], 0), Err(MathError::InvalidInput(_))));
    }

    #[test]
    fn multiple_offsets_keep_order() {
        let columns = lags(&[1.0, 2.0, 3.0, 4.0], &[2, 1]).unwrap();
        assert_eq!(columns[0], vec![None, None, Some(1.0), Some(2.0)]);
        assert_eq!(columns[1], vec![None, Some(1.0), Some(2.0), Some(3.0)]);
    }
}
