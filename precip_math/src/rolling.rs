//! Trailing-window aggregates
//!
//! Contains a streaming window that keeps the last `period` observations
//! and reports one of four statistics over them:
//! - Mean
//! - Sample standard deviation
//! - Minimum
//! - Maximum

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Statistic computed over a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingStatistic {
    Mean,
    Std,
    Min,
    Max,
}

impl RollingStatistic {
    /// Short lowercase name used in derived column names
    pub fn name(&self) -> &'static str {
        match self {
            RollingStatistic::Mean => "mean",
            RollingStatistic::Std => "std",
            RollingStatistic::Min => "min",
            RollingStatistic::Max => "max",
        }
    }
}

impl fmt::Display for RollingStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size window over the most recent observations
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl RollingWindow {
    /// Create a new window holding `period` observations
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Window length must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Push a new observation, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Whether `period` observations have been seen
    pub fn is_full(&self) -> bool {
        self.values.len() == self.period
    }

    /// Get the window length
    pub fn period(&self) -> usize {
        self.period
    }

    /// Compute `stat` over the current window
    pub fn value(&self, stat: RollingStatistic) -> Result<f64> {
        if !self.is_full() {
            return Err(MathError::InsufficientData(format!(
                "Need {} values in the window, have {}.",
                self.period,
                self.values.len()
            )));
        }

        match stat {
            // Recomputed rather than taken from `sum` so long series do not
            // accumulate floating point drift.
            RollingStatistic::Mean => Ok(self.values.iter().sum::<f64>() / self.period as f64),
            RollingStatistic::Std => {
                if self.period < 2 {
                    return Err(MathError::InsufficientData(
                        "Sample standard deviation needs at least two values".to_string(),
                    ));
                }
                let mean = self.values.iter().sum::<f64>() / self.period as f64;
                let variance = self
                    .values
                    .iter()
                    .map(|v| (v - mean).powi(2))
                    .sum::<f64>()
                    / (self.period - 1) as f64;
                Ok(variance.sqrt())
            }
            RollingStatistic::Min => Ok(self.values.iter().copied().fold(f64::INFINITY, f64::min)),
            RollingStatistic::Max => Ok(self
                .values
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max)),
        }
    }

    /// Running sum of the observations currently in the window
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Reset the window, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Compute `stat` over the trailing `window` observations ending at each position.
///
/// Positions before `window - 1` are undefined. A sample standard deviation
/// over a window of one is undefined everywhere.
pub fn rolling(series: &[f64], window: usize, stat: RollingStatistic) -> Result<Vec<Option<f64>>> {
    let mut state = RollingWindow::new(window)?;
    let mut out = Vec::with_capacity(series.len());

    for &value in series {
        state.update(value);
        out.push(state.value(stat).ok());
    }

    Ok(out)
}
