//! Random forest regression
//!
//! Trees are grown by `smartcore` on bootstrap samples with a random feature
//! subset considered at every split; predictions average the trees' leaves.

use crate::error::{ForecastError, Result};
use crate::models::{check_training_data, FeatureFrame, FittedRegressor, Regressor};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;
use tracing::debug;

/// Random forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum tree depth, unbounded when `None`
    pub max_depth: Option<u16>,
    /// Minimum samples needed to split a node
    pub min_samples_split: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Features considered per split, the library default when `None`
    pub max_features: Option<usize>,
    /// Seed of the bootstrap and feature sampling
    pub seed: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

impl RandomForestConfig {
    /// Reject settings no tree can be grown with
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "A forest needs at least one tree".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_leaf must be positive".to_string(),
            ));
        }
        if self.max_depth == Some(0) || self.max_features == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "max_depth and max_features must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    fn parameters(&self) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            n_trees: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            m: self.max_features,
            seed: self.seed,
            ..Default::default()
        }
    }
}

impl fmt::Display for RandomForestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self
            .max_depth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "None".to_string());
        write!(
            f,
            "n_estimators={}, max_depth={}, min_samples_split={}, min_samples_leaf={}",
            self.n_estimators, depth, self.min_samples_split, self.min_samples_leaf
        )
    }
}

/// Random forest strategy
#[derive(Debug, Clone)]
pub struct RandomForest {
    config: RandomForestConfig,
}

impl RandomForest {
    /// Create a new random forest strategy
    pub fn new(config: RandomForestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }
}

/// A fitted forest and the columns it was grown on
pub struct FittedForest {
    columns: Vec<String>,
    model: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl fmt::Debug for FittedForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedForest")
            .field("columns", &self.columns)
            .finish()
    }
}

fn to_matrix(x: &FeatureFrame) -> Result<DenseMatrix<f64>> {
    if x.is_empty() || x.width() == 0 {
        return Err(ForecastError::DataError(
            "A forest needs at least one row and one feature".to_string(),
        ));
    }
    Ok(DenseMatrix::from_2d_vec(&x.rows().to_vec()))
}

impl Regressor for RandomForest {
    type Fitted = FittedForest;

    fn name(&self) -> &str {
        "random_forest"
    }

    fn fit(&self, x: &FeatureFrame, y: &[f64]) -> Result<FittedForest> {
        check_training_data(x, y)?;
        let matrix = to_matrix(x)?;
        let targets = y.to_vec();
        let model = RandomForestRegressor::fit(&matrix, &targets, self.config.parameters())
            .map_err(|e| ForecastError::FitError(format!("Random forest: {}", e)))?;
        debug!(rows = x.len(), features = x.width(), config = %self.config, "fitted forest");
        Ok(FittedForest {
            columns: x.columns().to_vec(),
            model,
        })
    }
}

impl FittedRegressor for FittedForest {
    fn predict(&self, x: &FeatureFrame) -> Result<Vec<f64>> {
        if x.columns() != self.columns.as_slice() {
            return Err(ForecastError::ValidationError(format!(
                "Forest was fit on [{}] but asked to predict from [{}]",
                self.columns.join(", "),
                x.columns().join(", ")
            )));
        }
        let matrix = to_matrix(x)?;
        self.model
            .predict(&matrix)
            .map_err(|e| ForecastError::FitError(format!("Random forest prediction: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: usize) -> (FeatureFrame, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y = rows.iter().map(|r| 2.0 * r[1] + 1.0).collect();
        let frame = FeatureFrame::new(vec!["t".to_string(), "dow".to_string()], rows).unwrap();
        (frame, y)
    }

    #[test]
    fn learns_a_step_function() {
        let (x, y) = frame(140);
        let config = RandomForestConfig {
            n_estimators: 20,
            ..Default::default()
        };
        let fitted = RandomForest::new(config).unwrap().fit(&x, &y).unwrap();
        let predictions = fitted.predict(&x).unwrap();
        let mse = crate::metrics::mean_squared_error(&y, &predictions).unwrap();
        assert!(mse < 1.0, "in-sample mse {}", mse);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let config = RandomForestConfig {
            min_samples_split: 1,
            ..Default::default()
        };
        assert!(RandomForest::new(config).is_err());
    }

    #[test]
    fn predicting_with_other_columns_fails() {
        let (x, y) = frame(30);
        let fitted = RandomForest::new(RandomForestConfig {
            n_estimators: 5,
            ..Default::default()
        })
        .unwrap()
        .fit(&x, &y)
        .unwrap();
        let other = FeatureFrame::new(vec!["t".to_string()], vec![vec![1.0]]).unwrap();
        assert!(matches!(
            fitted.predict(&other),
            Err(ForecastError::ValidationError(_))
        ));
    }
}
