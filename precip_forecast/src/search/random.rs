//! Randomized search over a discrete random forest grid, scored by k-fold
//! cross-validation

use crate::error::{ForecastError, Result};
use crate::metrics::mean_squared_error;
use crate::models::forest::{FittedForest, RandomForest, RandomForestConfig};
use crate::models::{FeatureFrame, FittedRegressor, Regressor};
use crate::search::{k_fold, BestTracker, Candidate, Evaluation};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, info};

/// Discrete values of each random forest hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<u16>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![Some(10), Some(20), Some(30)],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }
}

impl ParamGrid {
    /// Reject a grid with an empty dimension
    pub fn validate(&self) -> Result<()> {
        let empty = [
            ("n_estimators", self.n_estimators.is_empty()),
            ("max_depth", self.max_depth.is_empty()),
            ("min_samples_split", self.min_samples_split.is_empty()),
            ("min_samples_leaf", self.min_samples_leaf.is_empty()),
        ];
        if let Some((name, _)) = empty.iter().find(|(_, is_empty)| *is_empty) {
            return Err(ForecastError::ConfigError(format!(
                "Parameter grid dimension '{}' has no values",
                name
            )));
        }
        Ok(())
    }

    /// Number of combinations
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, varying `min_samples_leaf` fastest
    pub fn combinations(&self, base: &RandomForestConfig) -> Vec<RandomForestConfig> {
        let mut out = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        out.push(RandomForestConfig {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                            ..*base
                        });
                    }
                }
            }
        }
        out
    }
}

/// Search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomSearchConfig {
    pub grid: ParamGrid,
    /// Distinct combinations to evaluate
    pub n_iter: usize,
    /// Cross-validation folds
    pub folds: usize,
    /// Seed of the combination sampler
    pub seed: u64,
    /// Settings shared by every candidate (seed, feature subset size)
    pub base: RandomForestConfig,
}

impl Default for RandomSearchConfig {
    fn default() -> Self {
        Self {
            grid: ParamGrid::default(),
            n_iter: 20,
            folds: 5,
            seed: 42,
            base: RandomForestConfig::default(),
        }
    }
}

/// Winning settings, the forest refit on all training rows and every score
#[derive(Debug)]
pub struct RandomSearchOutcome {
    pub best: Candidate<RandomForestConfig>,
    pub model: FittedForest,
    pub evaluated: Vec<Candidate<RandomForestConfig>>,
}

/// Samples grid combinations without replacement and keeps the one with the
/// best mean cross-validated negative MSE
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    config: RandomSearchConfig,
}

impl RandomizedSearch {
    pub fn new(config: RandomSearchConfig) -> Result<Self> {
        config.grid.validate()?;
        if config.n_iter == 0 {
            return Err(ForecastError::ConfigError(
                "Randomized search needs at least one iteration".to_string(),
            ));
        }
        if config.folds < 2 {
            return Err(ForecastError::ConfigError(format!(
                "Cross-validation needs at least 2 folds, got {}",
                config.folds
            )));
        }
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &RandomSearchConfig {
        &self.config
    }

    /// The combinations this search evaluates, in evaluation order
    ///
    /// All of them when the grid holds no more than `n_iter`.
    pub fn sample(&self) -> Vec<RandomForestConfig> {
        let combinations = self.config.grid.combinations(&self.config.base);
        if combinations.len() <= self.config.n_iter {
            return combinations;
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        sample(&mut rng, combinations.len(), self.config.n_iter)
            .into_iter()
            .map(|i| combinations[i])
            .collect()
    }

    /// Mean negative MSE of `config` over the folds
    pub fn cross_validate(
        &self,
        config: &RandomForestConfig,
        x: &FeatureFrame,
        y: &[f64],
    ) -> Result<f64> {
        let forest = RandomForest::new(*config)?;
        let mut scores = Vec::with_capacity(self.config.folds);
        for (train, validation) in k_fold(y.len(), self.config.folds)? {
            let x_train = x.select_rows(&train)?;
            let y_train: Vec<f64> = train.iter().map(|&i| y[i]).collect();
            let x_val = x.select_rows(&validation)?;
            let y_val: Vec<f64> = validation.iter().map(|&i| y[i]).collect();

            let fitted = forest.fit(&x_train, &y_train)?;
            let predictions = fitted.predict(&x_val)?;
            scores.push(-mean_squared_error(&y_val, &predictions)?);
        }
        Ok(scores.mean())
    }

    /// Evaluate the sampled combinations and refit the best on all rows
    pub fn run(&self, x: &FeatureFrame, y: &[f64]) -> Result<RandomSearchOutcome> {
        if x.len() != y.len() {
            return Err(ForecastError::ValidationError(format!(
                "Feature rows ({}) don't match targets ({})",
                x.len(),
                y.len()
            )));
        }

        let mut tracker = BestTracker::new();
        let mut evaluated = Vec::new();
        for config in self.sample() {
            let evaluation = Evaluation::from_result(self.cross_validate(&config, x, y));
            if let Some(score) = evaluation.score() {
                debug!(config = %config, score, "cross-validated forest");
                evaluated.push(Candidate {
                    params: config,
                    score,
                });
            }
            tracker.observe(config, evaluation);
        }

        let best = tracker.into_best()?;
        info!(config = %best.params, score = best.score, "best forest");
        let model = RandomForest::new(best.params)?.fit(x, y)?;
        Ok(RandomSearchOutcome {
            best,
            model,
            evaluated,
        })
    }
}
