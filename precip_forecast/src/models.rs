//! Model strategies
//!
//! Every strategy is fit on a [`FeatureFrame`] and a target vector and
//! produces a fitted model that predicts from another frame of the same
//! columns. The random forest predicts row by row, the SARIMA model reads
//! the rows as exogenous regressors of an out-of-sample path, and the LSTM
//! reads them as a sequence of channels.

use crate::data::ObservationTable;
use crate::error::{ForecastError, Result};

pub mod forest;
pub mod lstm;
pub mod sarima;

/// Row-major feature matrix with named columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureFrame {
    /// Create a frame, checking that every row has one value per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ForecastError::ValidationError(format!(
                "Row {} has {} values but the frame has {} columns",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a frame from named table columns
    pub fn from_table(table: &ObservationTable, columns: &[String]) -> Result<Self> {
        let rows = table.feature_matrix(columns)?;
        Self::new(columns.to_vec(), rows)
    }

    /// A frame with no columns and `len` rows, for models without regressors
    pub fn empty(len: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows: vec![Vec::new(); len],
        }
    }

    /// Get the column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get the rows
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of the rows at `indices`, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let rows = indices
            .iter()
            .map(|&i| {
                self.rows.get(i).cloned().ok_or_else(|| {
                    ForecastError::ValidationError(format!(
                        "Row {} out of range for a frame of {} rows",
                        i,
                        self.rows.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Fail unless `other` has the same columns in the same order
    pub fn check_columns(&self, other: &FeatureFrame) -> Result<()> {
        if self.columns != other.columns {
            return Err(ForecastError::ValidationError(format!(
                "Expected columns [{}], got [{}]",
                self.columns.join(", "),
                other.columns.join(", ")
            )));
        }
        Ok(())
    }
}

/// A configured, not yet fitted, model strategy
pub trait Regressor {
    /// The fitted model this strategy produces
    type Fitted: FittedRegressor;

    /// Short strategy name used in logs
    fn name(&self) -> &str;

    /// Fit the strategy to features `x` and aligned targets `y`
    fn fit(&self, x: &FeatureFrame, y: &[f64]) -> Result<Self::Fitted>;
}

/// A fitted model
pub trait FittedRegressor {
    /// Predict from a frame with the columns the model was fit on
    fn predict(&self, x: &FeatureFrame) -> Result<Vec<f64>>;
}

/// Fail unless `x` and `y` are aligned and non-empty
pub(crate) fn check_training_data(x: &FeatureFrame, y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(ForecastError::ValidationError(format!(
            "Feature rows ({}) don't match targets ({})",
            x.len(),
            y.len()
        )));
    }
    if y.is_empty() {
        return Err(ForecastError::DataError(
            "Cannot fit a model on an empty training set".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_rows_are_rejected() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let result = FeatureFrame::new(columns, vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(result, Err(ForecastError::ValidationError(_))));
    }

    #[test]
    fn select_rows_keeps_order() {
        let frame = FeatureFrame::new(
            vec!["a".to_string()],
            vec![vec![0.0], vec![1.0], vec![2.0]],
        )
        .unwrap();
        let picked = frame.select_rows(&[2, 0]).unwrap();
        assert_eq!(picked.rows(), &[vec![2.0], vec![0.0]]);
        assert!(frame.select_rows(&[3]).is_err());
    }
}
