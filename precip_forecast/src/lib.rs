//! # Precip Forecast
//!
//! A Rust library for daily precipitation forecasting experiments.
//!
//! ## Features
//!
//! - Daily weather tables loaded from CSV (date index, `Precipit` target)
//! - Lag, rolling-window and calendar feature engineering
//! - Chronological train/test splitting
//! - Random forest regression tuned by randomized search with k-fold cross-validation
//! - Seasonal ARIMA with exogenous regressors, tuned by grid or Bayesian search
//! - Stacked LSTM networks tuned by Bayesian search, with early stopping
//! - MSE, MAE and R² evaluation and SVG forecast charts
//!
//! ## Quick Start
//!
//! ```no_run
//! use precip_forecast::data::DataLoader;
//! use precip_forecast::experiments::{Experiment, SarimaGridExperiment};
//!
//! let table = DataLoader::from_csv("daily_weather.csv")?;
//! let outcome = SarimaGridExperiment::default().run(&table)?;
//! println!("{}: {}", outcome.best_params, outcome.report);
//! # Ok::<(), precip_forecast::ForecastError>(())
//! ```

pub mod data;
pub mod error;
pub mod experiments;
pub mod features;
mod linalg;
pub mod metrics;
pub mod models;
pub mod report;
pub mod search;
pub mod split;
pub mod synthetic;

// Re-export commonly used types
pub use crate::data::{DataLoader, ObservationTable};
pub use crate::error::ForecastError;
pub use crate::experiments::{Experiment, ExperimentOutcome, ExperimentsConfig};
pub use crate::features::{FeatureEngineer, FeatureSpec};
pub use crate::metrics::EvaluationReport;
pub use crate::models::{FeatureFrame, FittedRegressor, Regressor};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
