//! Hyperparameter searches
//!
//! Every search scores candidates so that higher is better and keeps the
//! best one it has seen. A candidate that cannot be evaluated is recorded
//! as [`Evaluation::Failed`] and the search moves on; only a search in which
//! every candidate fails is an error.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod bayesian;
mod gp;
pub mod grid;
pub mod random;

pub use bayesian::{BayesianConfig, BayesianOptimizer, BayesianOutcome, Bound, Trial};
pub use grid::{GridSearch, SarimaGrid};
pub use random::{ParamGrid, RandomizedSearch};

/// Outcome of evaluating one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Candidate evaluated; higher is better
    Scored(f64),
    /// Candidate could not be fit or scored
    Failed(String),
}

impl Evaluation {
    /// Turn a fallible score into an evaluation, treating non-finite scores as failures
    pub fn from_result(result: Result<f64>) -> Self {
        match result {
            Ok(score) if score.is_finite() => Evaluation::Scored(score),
            Ok(score) => Evaluation::Failed(format!("non-finite score {}", score)),
            Err(e) => Evaluation::Failed(e.to_string()),
        }
    }

    /// The score, if evaluation succeeded
    pub fn score(&self) -> Option<f64> {
        match self {
            Evaluation::Scored(score) => Some(*score),
            Evaluation::Failed(_) => None,
        }
    }
}

/// A hyperparameter setting and its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate<P> {
    pub params: P,
    pub score: f64,
}

/// Keeps the best-scoring candidate; ties keep the first seen
#[derive(Debug, Clone)]
pub struct BestTracker<P> {
    best: Option<Candidate<P>>,
    attempted: usize,
    failed: usize,
}

impl<P> Default for BestTracker<P> {
    fn default() -> Self {
        Self {
            best: None,
            attempted: 0,
            failed: 0,
        }
    }
}

impl<P: std::fmt::Debug> BestTracker<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an evaluation; returns whether it became the best
    pub fn observe(&mut self, params: P, evaluation: Evaluation) -> bool {
        self.attempted += 1;
        match evaluation {
            Evaluation::Scored(score) => {
                let improves = self.best.as_ref().map_or(true, |best| score > best.score);
                if improves {
                    self.best = Some(Candidate { params, score });
                }
                improves
            }
            Evaluation::Failed(reason) => {
                self.failed += 1;
                warn!(params = ?params, reason = %reason, "skipping failed candidate");
                false
            }
        }
    }

    /// Best candidate so far
    pub fn best(&self) -> Option<&Candidate<P>> {
        self.best.as_ref()
    }

    /// Candidates observed
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Candidates that failed
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// The best candidate, or [`ForecastError::SearchExhausted`] if none succeeded
    pub fn into_best(self) -> Result<Candidate<P>> {
        self.best.ok_or(ForecastError::SearchExhausted {
            attempted: self.attempted,
        })
    }
}

/// Contiguous, unshuffled k-fold partitions of `0..n`
///
/// The first `n % k` folds hold one extra row. Returns `(train, validation)`
/// index pairs.
pub fn k_fold(n: usize, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(ForecastError::ConfigError(format!(
            "Cross-validation needs at least 2 folds, got {}",
            k
        )));
    }
    if n < k {
        return Err(ForecastError::DataError(format!(
            "Cannot split {} rows into {} folds",
            n, k
        )));
    }

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let train = (0..start).chain(end..n).collect();
        let validation = (start..end).collect();
        folds.push((train, validation));
        start = end;
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tracker_keeps_first_of_ties() {
        let mut tracker = BestTracker::new();
        assert!(tracker.observe("a", Evaluation::Scored(-1.0)));
        assert!(!tracker.observe("b", Evaluation::Scored(-1.0)));
        assert!(!tracker.observe("c", Evaluation::Failed("boom".to_string())));
        assert!(tracker.observe("d", Evaluation::Scored(0.5)));
        assert_eq!(tracker.attempted(), 4);
        assert_eq!(tracker.failed(), 1);
        assert_eq!(tracker.into_best().unwrap().params, "d");
    }

    #[test]
    fn all_failures_exhaust_the_search() {
        let mut tracker: BestTracker<u8> = BestTracker::new();
        tracker.observe(1, Evaluation::Failed("x".to_string()));
        tracker.observe(2, Evaluation::from_result(Ok(f64::NAN)));
        assert!(matches!(
            tracker.into_best(),
            Err(ForecastError::SearchExhausted { attempted: 2 })
        ));
    }

    #[test]
    fn folds_are_contiguous_and_cover_every_row() {
        let folds = k_fold(11, 5).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|(_, v)| v.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2, 2, 2]);
        assert_eq!(folds[0].1, vec![0, 1, 2]);
        assert_eq!(&folds[1].0[..3], &[0, 1, 2]);
        let mut covered: Vec<usize> = folds.iter().flat_map(|(_, v)| v.clone()).collect();
        covered.sort();
        assert_eq!(covered, (0..11).collect::<Vec<_>>());
    }
}
