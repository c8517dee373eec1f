//! Column standardisation
//!
//! Rows are observations, columns are channels. The scaler learns a mean and
//! a population standard deviation per column and maps values to z-scores.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Per-column z-score scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Learn column means and standard deviations from row-major `rows`
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let first = rows.first().ok_or_else(|| {
            MathError::InsufficientData("Cannot fit a scaler on zero rows".to_string())
        })?;
        let width = first.len();
        if rows.iter().any(|row| row.len() != width) {
            return Err(MathError::InvalidInput(
                "All rows must have the same number of columns".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((scale, value), mean) in scales.iter_mut().zip(row).zip(&means) {
                *scale += (value - mean).powi(2);
            }
        }
        for scale in scales.iter_mut() {
            let std = (*scale / n).sqrt();
            // constant columns pass through centred but unscaled
            *scale = if std > f64::EPSILON { std } else { 1.0 };
        }

        Ok(Self { means, scales })
    }

    /// Number of columns the scaler was fit on
    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Standardise `rows` with the learned statistics
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.width() {
                    return Err(MathError::InvalidInput(format!(
                        "Expected {} columns, got {}",
                        self.width(),
                        row.len()
                    )));
                }
                Ok(row
                    .iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (mean, scale))| (v - mean) / scale)
                    .collect())
            })
            .collect()
    }

    /// Map standardised values of `column` back to the original units
    pub fn inverse_transform_column(&self, column: usize, values: &[f64]) -> Result<Vec<f64>> {
        if column >= self.width() {
            return Err(MathError::InvalidInput(format!(
                "Column {} out of range for scaler of width {}",
                column,
                self.width()
            )));
        }
        let (mean, scale) = (self.means[column], self.scales[column]);
        Ok(values.iter().map(|v| v * scale + mean).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transform_produces_zero_mean_unit_variance() {
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0], vec![4.0, 40.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();

        for col in 0..2 {
            let values: Vec<f64> = scaled.iter().map(|r| r[col]).collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
            assert_relative_eq!(var, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn inverse_transform_restores_column() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 7.0], vec![8.0, 9.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();
        let column: Vec<f64> = scaled.iter().map(|r| r[0]).collect();

        let restored = scaler.inverse_transform_column(0, &column).unwrap();
        for (restored, row) in restored.iter().zip(&rows) {
            assert_relative_eq!(*restored, row[0], epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_column_is_not_divided_by_zero() {
        let rows = vec![vec![2.0], vec![2.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.transform(&rows).unwrap(), vec![vec![0.0], vec![0.0]]);
    }

    #[test]
    fn ragged_or_empty_input_is_rejected() {
        assert!(StandardScaler::fit(&[]).is_err());
        assert!(StandardScaler::fit(&[vec![1.0, 2.0], vec![1.0]]).is_err());
    }
}
