//! Bayesian optimisation over a bounded box
//!
//! A handful of uniformly random trials seed a Gaussian process surrogate;
//! every further trial maximises the upper confidence bound `μ + κσ` over a
//! batch of random candidates. Objectives report [`Evaluation`]s and failed
//! trials feed the surrogate with a fixed penalty so the search steers away
//! from them.

use crate::error::{ForecastError, Result};
use crate::search::gp::GaussianProcess;
use crate::search::{BestTracker, Candidate, Evaluation};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Named closed interval of one search dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl Bound {
    pub fn new(name: &str, low: f64, high: f64) -> Self {
        Self {
            name: name.to_string(),
            low,
            high,
        }
    }

    fn normalise(&self, value: f64) -> f64 {
        (value - self.low) / (self.high - self.low)
    }

    fn denormalise(&self, unit: f64) -> f64 {
        self.low + unit * (self.high - self.low)
    }
}

/// Search budget and acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianConfig {
    /// Random trials before the surrogate is used
    pub init_points: usize,
    /// Surrogate-guided trials
    pub n_iter: usize,
    /// Exploration weight of the upper confidence bound
    pub kappa: f64,
    /// Random candidates scored by the acquisition per guided trial
    pub n_candidates: usize,
    /// Target recorded for a trial whose objective failed
    pub failure_penalty: f64,
    pub seed: u64,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            init_points: 5,
            n_iter: 20,
            kappa: 2.576,
            n_candidates: 2000,
            failure_penalty: -1000.0,
            seed: 42,
        }
    }
}

/// One evaluated point
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub point: Vec<f64>,
    pub evaluation: Evaluation,
}

/// Best successful trial and the full trial history
#[derive(Debug, Clone)]
pub struct BayesianOutcome {
    pub best: Candidate<Vec<f64>>,
    pub history: Vec<Trial>,
}

/// Box-bounded black-box maximiser
#[derive(Debug, Clone)]
pub struct BayesianOptimizer {
    bounds: Vec<Bound>,
    config: BayesianConfig,
}

impl BayesianOptimizer {
    /// Create an optimizer after checking bounds and budget
    pub fn new(bounds: Vec<Bound>, config: BayesianConfig) -> Result<Self> {
        if bounds.is_empty() {
            return Err(ForecastError::ConfigError(
                "Bayesian search needs at least one dimension".to_string(),
            ));
        }
        if let Some(bound) = bounds
            .iter()
            .find(|b| !(b.low.is_finite() && b.high.is_finite() && b.low < b.high))
        {
            return Err(ForecastError::ConfigError(format!(
                "Bound '{}' is not a finite interval with low < high ({}, {})",
                bound.name, bound.low, bound.high
            )));
        }
        if config.init_points == 0 {
            return Err(ForecastError::ConfigError(
                "Bayesian search needs at least one initial trial".to_string(),
            ));
        }
        if config.n_iter > 0 && config.n_candidates == 0 {
            return Err(ForecastError::ConfigError(
                "Guided trials need at least one acquisition candidate".to_string(),
            ));
        }
        if !config.kappa.is_finite() || config.kappa < 0.0 || !config.failure_penalty.is_finite() {
            return Err(ForecastError::ConfigError(
                "kappa must be a non-negative number and the failure penalty finite".to_string(),
            ));
        }
        Ok(Self { bounds, config })
    }

    /// Get the bounds
    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    /// Get the configuration
    pub fn config(&self) -> &BayesianConfig {
        &self.config
    }

    fn random_unit(&self, rng: &mut StdRng) -> Vec<f64> {
        (0..self.bounds.len()).map(|_| rng.gen::<f64>()).collect()
    }

    fn to_point(&self, unit: &[f64]) -> Vec<f64> {
        self.bounds.iter().zip(unit).map(|(b, u)| b.denormalise(*u)).collect()
    }

    /// Unit-cube point with the highest upper confidence bound
    fn suggest(&self, history: &[Trial], targets: &[f64], rng: &mut StdRng) -> Result<Vec<f64>> {
        let dims = self.bounds.len();
        let observed = Array2::from_shape_fn((history.len(), dims), |(i, j)| {
            self.bounds[j].normalise(history[i].point[j])
        });
        let gp = GaussianProcess::fit(observed, targets)?;

        let mut best_unit = self.random_unit(rng);
        let mut best_acquisition = f64::NEG_INFINITY;
        for _ in 0..self.config.n_candidates {
            let unit = self.random_unit(rng);
            let (mean, std) = gp.predict(ndarray::ArrayView1::from(&unit[..]));
            let acquisition = mean + self.config.kappa * std;
            if acquisition > best_acquisition {
                best_acquisition = acquisition;
                best_unit = unit;
            }
        }
        Ok(best_unit)
    }

    /// Maximise `objective` over the box
    ///
    /// The objective receives raw, unrounded coordinates in bound order.
    pub fn maximize<F>(&self, mut objective: F) -> Result<BayesianOutcome>
    where
        F: FnMut(&[f64]) -> Evaluation,
    {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut history: Vec<Trial> = Vec::new();
        let mut targets: Vec<f64> = Vec::new();
        let mut tracker = BestTracker::new();
        let total = self.config.init_points + self.config.n_iter;

        for step in 0..total {
            let unit = if step < self.config.init_points {
                self.random_unit(&mut rng)
            } else {
                self.suggest(&history, &targets, &mut rng)?
            };
            let point = self.to_point(&unit);
            let evaluation = objective(&point);
            let target = evaluation.score().unwrap_or(self.config.failure_penalty);
            debug!(step, point = ?point, target, "bayesian trial");

            tracker.observe(point.clone(), evaluation.clone());
            targets.push(target);
            history.push(Trial { point, evaluation });
        }

        let failed = tracker.failed();
        let best = tracker.into_best()?;
        info!(
            trials = history.len(),
            failed,
            best_score = best.score,
            "bayesian search finished"
        );
        Ok(BayesianOutcome { best, history })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn finds_the_peak_of_a_smooth_function() {
        let optimizer = BayesianOptimizer::new(
            vec![Bound::new("x", -2.0, 2.0)],
            BayesianConfig {
                init_points: 4,
                n_iter: 12,
                n_candidates: 500,
                ..Default::default()
            },
        )
        .unwrap();
        let outcome = optimizer
            .maximize(|p| Evaluation::Scored(-(p[0] - 0.7).powi(2)))
            .unwrap();
        assert_eq!(outcome.history.len(), 16);
        assert_relative_eq!(outcome.best.params[0], 0.7, epsilon = 0.3);
    }

    #[test]
    fn inverted_bounds_are_configuration_errors() {
        let result = BayesianOptimizer::new(vec![Bound::new("d", 2.0, 0.0)], BayesianConfig::default());
        assert!(matches!(result, Err(ForecastError::ConfigError(_))));
    }

    #[test]
    fn trials_stay_inside_the_box() {
        let optimizer = BayesianOptimizer::new(
            vec![Bound::new("a", 0.0, 3.0), Bound::new("b", 1e-4, 1e-2)],
            BayesianConfig {
                init_points: 3,
                n_iter: 3,
                n_candidates: 50,
                ..Default::default()
            },
        )
        .unwrap();
        let outcome = optimizer.maximize(|p| Evaluation::Scored(p[0] + p[1])).unwrap();
        for trial in &outcome.history {
            assert!((0.0..=3.0).contains(&trial.point[0]));
            assert!((1e-4..=1e-2).contains(&trial.point[1]));
        }
    }
}
