//! Exhaustive search over an explicit candidate list

use crate::error::{ForecastError, Result};
use crate::models::sarima::{SarimaOrder, WEEKLY_PERIOD};
use crate::search::{BestTracker, Candidate, Evaluation};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, info};

/// Inclusive upper limits of every SARIMA order component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaGrid {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    pub max_seasonal_p: usize,
    pub max_seasonal_d: usize,
    pub max_seasonal_q: usize,
    pub period: usize,
}

impl Default for SarimaGrid {
    fn default() -> Self {
        Self {
            max_p: 2,
            max_d: 2,
            max_q: 2,
            max_seasonal_p: 1,
            max_seasonal_d: 1,
            max_seasonal_q: 1,
            period: WEEKLY_PERIOD,
        }
    }
}

impl SarimaGrid {
    /// Every order in lexicographic `(p, d, q, P, D, Q)` order
    pub fn orders(&self) -> Vec<SarimaOrder> {
        let mut orders = Vec::new();
        for p in 0..=self.max_p {
            for d in 0..=self.max_d {
                for q in 0..=self.max_q {
                    for sp in 0..=self.max_seasonal_p {
                        for sd in 0..=self.max_seasonal_d {
                            for sq in 0..=self.max_seasonal_q {
                                orders.push(
                                    SarimaOrder::new(p, d, q).with_seasonal(sp, sd, sq, self.period),
                                );
                            }
                        }
                    }
                }
            }
        }
        orders
    }
}

/// Evaluates every candidate and keeps the best
#[derive(Debug, Clone)]
pub struct GridSearch<P> {
    candidates: Vec<P>,
}

impl<P: Clone + Debug> GridSearch<P> {
    /// Create a search, rejecting an empty candidate list
    pub fn new(candidates: Vec<P>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(ForecastError::ConfigError(
                "Grid search needs at least one candidate".to_string(),
            ));
        }
        Ok(Self { candidates })
    }

    /// Get the candidates
    pub fn candidates(&self) -> &[P] {
        &self.candidates
    }

    /// Score every candidate in order; failures are logged and skipped
    pub fn run<F>(&self, mut objective: F) -> Result<Candidate<P>>
    where
        F: FnMut(&P) -> Evaluation,
    {
        let mut tracker = BestTracker::new();
        for params in &self.candidates {
            let evaluation = objective(params);
            if let Evaluation::Scored(score) = evaluation {
                debug!(params = ?params, score, "grid candidate");
            }
            tracker.observe(params.clone(), evaluation);
        }
        info!(
            candidates = tracker.attempted(),
            failed = tracker.failed(),
            "grid search finished"
        );
        tracker.into_best()
    }
}
