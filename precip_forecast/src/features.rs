//! Feature derivation from the target series
//!
//! Lagged copies, trailing-window aggregates and calendar encodings are
//! appended to an [`ObservationTable`]; every row left with an undefined
//! value by insufficient history is then dropped.

use crate::data::ObservationTable;
use crate::error::{ForecastError, Result};
use precip_math::calendar;
use precip_math::lags::lag;
use precip_math::rolling::{rolling, RollingStatistic};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Calendar-derived feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarFeature {
    /// Monday = 0 through Sunday = 6
    DayOfWeek,
    /// 1 through 12
    Month,
    /// 1 through 366
    DayOfYear,
    /// `sin(2π·i/365)` of the zero-based row position
    AnnualSin,
    /// `cos(2π·i/365)` of the zero-based row position
    AnnualCos,
}

impl CalendarFeature {
    /// Column name of the derived feature
    pub fn column_name(&self) -> &'static str {
        match self {
            CalendarFeature::DayOfWeek => "day_of_week",
            CalendarFeature::Month => "month",
            CalendarFeature::DayOfYear => "day_of_year",
            CalendarFeature::AnnualSin => "sin_365",
            CalendarFeature::AnnualCos => "cos_365",
        }
    }
}

/// A trailing-window aggregate to derive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingFeature {
    pub stat: RollingStatistic,
    pub window: usize,
}

impl RollingFeature {
    pub fn new(stat: RollingStatistic, window: usize) -> Self {
        Self { stat, window }
    }
}

/// Declared lag, rolling and calendar configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Positive lag offsets
    pub lags: Vec<usize>,
    /// Trailing-window aggregates
    pub rolling: Vec<RollingFeature>,
    /// Calendar encodings
    pub calendar: Vec<CalendarFeature>,
    /// Name lag columns `{target}_lag_{k}` instead of `lag_{k}`
    #[serde(default)]
    pub prefix_target: bool,
}

impl FeatureSpec {
    /// Lags 1 to 7, 3- and 7-day means and integer calendar fields
    pub fn forest() -> Self {
        Self {
            lags: (1..=7).collect(),
            rolling: vec![
                RollingFeature::new(RollingStatistic::Mean, 3),
                RollingFeature::new(RollingStatistic::Mean, 7),
            ],
            calendar: vec![
                CalendarFeature::DayOfWeek,
                CalendarFeature::Month,
                CalendarFeature::DayOfYear,
            ],
            prefix_target: true,
        }
    }

    /// Weekly lag with weekly mean and volatility
    pub fn sarima_grid() -> Self {
        Self {
            lags: vec![7],
            rolling: vec![
                RollingFeature::new(RollingStatistic::Mean, 7),
                RollingFeature::new(RollingStatistic::Std, 7),
            ],
            calendar: Vec::new(),
            prefix_target: false,
        }
    }

    /// Weekly and fortnightly lags with every weekly aggregate
    pub fn sarima_bayes() -> Self {
        Self {
            lags: vec![7, 14],
            rolling: vec![
                RollingFeature::new(RollingStatistic::Mean, 7),
                RollingFeature::new(RollingStatistic::Std, 7),
                RollingFeature::new(RollingStatistic::Max, 7),
                RollingFeature::new(RollingStatistic::Min, 7),
            ],
            calendar: Vec::new(),
            prefix_target: false,
        }
    }

    /// Long lags, weekly and fortnightly means and the annual sine/cosine pair
    pub fn lstm() -> Self {
        Self {
            lags: vec![7, 14, 30],
            rolling: vec![
                RollingFeature::new(RollingStatistic::Mean, 7),
                RollingFeature::new(RollingStatistic::Mean, 14),
            ],
            calendar: vec![CalendarFeature::AnnualSin, CalendarFeature::AnnualCos],
            prefix_target: true,
        }
    }

    /// Reject zero offsets and zero windows
    pub fn validate(&self) -> Result<()> {
        if self.lags.iter().any(|&k| k == 0) {
            return Err(ForecastError::ConfigError(
                "Lag offsets must be positive".to_string(),
            ));
        }
        if self.rolling.iter().any(|r| r.window == 0) {
            return Err(ForecastError::ConfigError(
                "Rolling windows must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Names of the lag columns for `target`
    pub fn lag_names(&self, target: &str) -> Vec<String> {
        self.lags
            .iter()
            .map(|k| {
                if self.prefix_target {
                    format!("{}_lag_{}", target, k)
                } else {
                    format!("lag_{}", k)
                }
            })
            .collect()
    }

    /// Names of the rolling columns
    pub fn rolling_names(&self) -> Vec<String> {
        self.rolling
            .iter()
            .map(|r| format!("rolling_{}_{}", r.stat, r.window))
            .collect()
    }

    /// Names of every derived column, in derivation order
    pub fn column_names(&self, target: &str) -> Vec<String> {
        let mut names = self.lag_names(target);
        names.extend(self.rolling_names());
        names.extend(self.calendar.iter().map(|c| c.column_name().to_string()));
        names
    }

    /// Rows lost at the start of a series by the largest lag or window
    pub fn warmup(&self) -> usize {
        let max_lag = self.lags.iter().copied().max().unwrap_or(0);
        let max_window = self
            .rolling
            .iter()
            .map(|r| match r.stat {
                // sample std needs two values even in a window of one
                RollingStatistic::Std => r.window.max(2) - 1,
                _ => r.window - 1,
            })
            .max()
            .unwrap_or(0);
        max_lag.max(max_window)
    }
}

/// Applies a [`FeatureSpec`] to observation tables
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    spec: FeatureSpec,
}

impl FeatureEngineer {
    /// Create a feature engineer after validating the feature set
    pub fn new(spec: FeatureSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self { spec })
    }

    /// Get the feature set
    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    /// Derived column names for `table`
    pub fn feature_names(&self, table: &ObservationTable) -> Vec<String> {
        self.spec.column_names(table.target_column())
    }

    /// Append every declared feature without dropping rows
    pub fn augment(&self, table: &ObservationTable) -> Result<ObservationTable> {
        let target_name = table.target_column().to_string();
        let target = table.target()?;
        let mut out = table.clone();

        for (k, name) in self.spec.lags.iter().zip(self.spec.lag_names(&target_name)) {
            out = out.with_column(&name, lag(&target, *k)?)?;
        }

        for (feature, name) in self.spec.rolling.iter().zip(self.spec.rolling_names()) {
            out = out.with_column(&name, rolling(&target, feature.window, feature.stat)?)?;
        }

        if !self.spec.calendar.is_empty() {
            let dates = table.dates()?;
            for feature in &self.spec.calendar {
                let values: Vec<Option<f64>> = dates
                    .iter()
                    .enumerate()
                    .map(|(i, date)| {
                        Some(match feature {
                            CalendarFeature::DayOfWeek => calendar::day_of_week(*date) as f64,
                            CalendarFeature::Month => calendar::month(*date) as f64,
                            CalendarFeature::DayOfYear => calendar::day_of_year(*date) as f64,
                            CalendarFeature::AnnualSin => calendar::annual_sin(i),
                            CalendarFeature::AnnualCos => calendar::annual_cos(i),
                        })
                    })
                    .collect();
                out = out.with_column(feature.column_name(), values)?;
            }
        }

        Ok(out)
    }

    /// Append every declared feature and drop rows where the target or a
    /// derived column is undefined
    pub fn derive(&self, table: &ObservationTable) -> Result<ObservationTable> {
        self.derive_with_inputs(table, &[])
    }

    /// Like [`derive`](Self::derive), but rows must also have every column
    /// in `inputs` defined. Gaps in other columns never drop a row.
    pub fn derive_with_inputs(
        &self,
        table: &ObservationTable,
        inputs: &[String],
    ) -> Result<ObservationTable> {
        let augmented = self.augment(table)?;
        let derived = self.spec.column_names(table.target_column());
        let mut required: Vec<&str> = vec![table.target_column()];
        required.extend(derived.iter().map(String::as_str));
        required.extend(inputs.iter().map(String::as_str));
        let cleaned = augmented.drop_undefined_in(&required)?;
        debug!(
            before = table.len(),
            after = cleaned.len(),
            features = self.spec.column_names(table.target_column()).len(),
            "derived features"
        );
        if cleaned.is_empty() {
            return Err(ForecastError::DataError(format!(
                "No rows left after feature derivation ({} rows in, {} warm-up rows needed)",
                table.len(),
                self.spec.warmup()
            )));
        }
        Ok(cleaned)
    }
}
