//! Chronological train/test partitioning
//!
//! The series is never shuffled: the first `floor(N * f)` rows train, the rest test.

use crate::data::ObservationTable;
use crate::error::{ForecastError, Result};

/// Fraction of rows used for training by every experiment
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// Index of the first test row for `n` rows and a training fraction
pub fn split_point(n: usize, train_fraction: f64) -> Result<usize> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Training fraction must lie strictly between 0 and 1, got {}",
            train_fraction
        )));
    }

    let point = (n as f64 * train_fraction).floor() as usize;
    if point == 0 || point >= n {
        return Err(ForecastError::DataError(format!(
            "Splitting {} rows at fraction {} leaves an empty partition",
            n, train_fraction
        )));
    }
    Ok(point)
}

/// Split a slice into leading training and trailing test parts
pub fn split_slice<T: Clone>(data: &[T], train_fraction: f64) -> Result<(Vec<T>, Vec<T>)> {
    let point = split_point(data.len(), train_fraction)?;
    Ok((data[..point].to_vec(), data[point..].to_vec()))
}

/// Split a table into leading training and trailing test tables
pub fn chronological_split(
    table: &ObservationTable,
    train_fraction: f64,
) -> Result<(ObservationTable, ObservationTable)> {
    let n = table.len();
    let point = split_point(n, train_fraction)?;
    Ok((table.slice(0, point), table.slice(point, n - point)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100, 0.8, 80)]
    #[case(10, 0.8, 8)]
    #[case(7, 0.8, 5)]
    #[case(3, 0.5, 1)]
    fn split_point_floors(#[case] n: usize, #[case] fraction: f64, #[case] expected: usize) {
        assert_eq!(split_point(n, fraction).unwrap(), expected);
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.2)]
    #[case(f64::NAN)]
    fn fraction_out_of_range(#[case] fraction: f64) {
        assert!(matches!(
            split_point(10, fraction),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_partition_fails_loudly() {
        assert!(matches!(split_point(1, 0.8), Err(ForecastError::DataError(_))));
        assert!(matches!(split_point(0, 0.5), Err(ForecastError::DataError(_))));
    }

    #[test]
    fn slice_keeps_order() {
        let data: Vec<i32> = (0..10).collect();
        let (train, test) = split_slice(&data, 0.8).unwrap();
        assert_eq!(train, (0..8).collect::<Vec<_>>());
        assert_eq!(test, vec![8, 9]);
    }
}
