//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use statrs::statistics::Statistics;
use std::fmt;

fn check_aligned(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::ValidationError(format!(
            "Actual and predicted values must have the same non-zero length (got {} and {})",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

/// Mean of squared residuals
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_aligned(actual, predicted)?;
    Ok(actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .mean())
}

/// Mean of absolute residuals
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_aligned(actual, predicted)?;
    Ok(actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).mean())
}

/// Coefficient of determination `1 - SS_res / SS_tot`
///
/// A constant `actual` series has no variance to explain, and the score is
/// reported as [`ForecastError::UndefinedMetric`] rather than a sentinel.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_aligned(actual, predicted)?;
    let mean = actual.iter().mean();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Err(ForecastError::UndefinedMetric(
            "R² is undefined when the actual values have zero variance".to_string(),
        ));
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(1.0 - ss_res / ss_tot)
}

/// Held-out performance of a fitted model
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Mean Squared Error
    pub mse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Coefficient of determination, `None` when undefined
    pub r2: Option<f64>,
}

/// Evaluate predictions, failing when any metric is undefined
pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<EvaluationReport> {
    Ok(EvaluationReport {
        mse: mean_squared_error(actual, predicted)?,
        mae: mean_absolute_error(actual, predicted)?,
        r2: Some(r2_score(actual, predicted)?),
    })
}

/// Evaluate predictions, recording an undefined R² as `None`
pub fn evaluate_lenient(actual: &[f64], predicted: &[f64]) -> Result<EvaluationReport> {
    let r2 = match r2_score(actual, predicted) {
        Ok(value) => Some(value),
        Err(ForecastError::UndefinedMetric(_)) => None,
        Err(e) => return Err(e),
    };
    Ok(EvaluationReport {
        mse: mean_squared_error(actual, predicted)?,
        mae: mean_absolute_error(actual, predicted)?,
        r2,
    })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  MSE: {:.4}", self.mse)?;
        writeln!(f, "  MAE: {:.4}", self.mae)?;
        match self.r2 {
            Some(r2) => writeln!(f, "  R²:  {:.4}", r2),
            None => writeln!(f, "  R²:  undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfect_predictions() {
        let y = [1.0, 2.0, 3.0];
        let report = evaluate(&y, &y).unwrap();
        assert_eq!(report.mse, 0.0);
        assert_eq!(report.mae, 0.0);
        assert_eq!(report.r2, Some(1.0));
    }

    #[test]
    fn constant_offset() {
        let report = evaluate(&[1.0, 2.0, 3.0], &[2.0, 3.0, 4.0]).unwrap();
        assert_relative_eq!(report.mse, 1.0);
        assert_relative_eq!(report.mae, 1.0);
        assert_relative_eq!(report.r2.unwrap(), -0.5);
    }

    #[test]
    fn lenient_keeps_other_metrics() {
        let report = evaluate_lenient(&[2.0, 2.0], &[1.0, 3.0]).unwrap();
        assert_relative_eq!(report.mse, 1.0);
        assert!(report.r2.is_none());
        assert!(report.to_string().contains("undefined"));
    }
}
