//! # Precip Math
//!
//! Numeric building blocks for daily weather series.
//! This crate provides the pure calculations the forecasting pipeline is
//! assembled from: lagged values, trailing-window aggregates, calendar
//! encodings, column standardisation and differencing polynomials.

use thiserror::Error;

pub mod calendar;
pub mod differencing;
pub mod lags;
pub mod rolling;
pub mod scaling;

pub use crate::rolling::{RollingStatistic, RollingWindow};
pub use crate::scaling::StandardScaler;

/// Errors that can occur in series calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;
