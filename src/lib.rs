//! # Precip Workspace
//!
//! Umbrella crate for the precipitation forecasting workspace.
//!
//! - [`math`]: series primitives (lags, rolling windows, calendar encodings,
//!   scaling, differencing)
//! - [`forecast`]: data loading, feature engineering, model strategies,
//!   hyperparameter searches, evaluation and charts
//!
//! ## Example
//!
//! ```
//! use precip_workspace::forecast::synthetic::SyntheticSeries;
//! use precip_workspace::math::lags::lag;
//!
//! let table = SyntheticSeries { days: 14, ..Default::default() }.generate().unwrap();
//! let lagged = lag(&table.target().unwrap(), 7).unwrap();
//! assert_eq!(lagged[7], Some(table.target().unwrap()[0]));
//! ```

pub use precip_forecast as forecast;
pub use precip_math as math;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
