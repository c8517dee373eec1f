//! Error types for the precip_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the precip_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Missing columns, unparseable values, empty partitions
    #[error("Data error: {0}")]
    DataError(String),

    /// Shape or length mismatches between aligned inputs
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid search space or experiment configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A single model configuration could not be fit or evaluated
    #[error("Fit error: {0}")]
    FitError(String),

    /// Every candidate of a hyperparameter search failed
    #[error("Search exhausted: no candidate out of {attempted} could be evaluated")]
    SearchExhausted { attempted: usize },

    /// A metric whose value is mathematically undefined for the input
    #[error("Undefined metric: {0}")]
    UndefinedMetric(String),

    /// Error from the series math crate
    #[error("Math error: {0}")]
    MathError(#[from] precip_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error while rendering a chart
    #[error("Plot error: {0}")]
    PlotError(String),

    /// Error reading or writing configuration files
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Error writing result files
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

