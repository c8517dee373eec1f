//! End-to-end experiments
//!
//! Each experiment derives its own feature set, splits the table
//! chronologically, tunes its strategy, refits the best configuration on
//! the training block and scores it on the held-out block.

use crate::data::{ObservationTable, WEATHER_COLUMNS};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureEngineer, FeatureSpec};
use crate::metrics::{evaluate_lenient, mean_squared_error, EvaluationReport};
use crate::models::lstm::{LstmConfig, LstmRegressor};
use crate::models::sarima::{Sarima, SarimaConfig, SarimaOrder, WEEKLY_PERIOD};
use crate::models::{FeatureFrame, FittedRegressor, Regressor};
use crate::report::forecast_chart;
use crate::search::random::{RandomSearchConfig, RandomizedSearch};
use crate::search::{BayesianConfig, BayesianOptimizer, Bound, Evaluation, GridSearch, SarimaGrid};
use crate::split::{chronological_split, DEFAULT_TRAIN_FRACTION};
use chrono::NaiveDate;
use precip_math::scaling::StandardScaler;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Result of one experiment
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    /// Experiment name
    pub name: String,
    /// Winning hyperparameters, human readable
    pub best_params: String,
    /// Held-out metrics
    pub report: EvaluationReport,
    /// Dates of the scored rows
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    /// Train, test and predicted series as an SVG document
    pub chart_svg: String,
}

/// A runnable experiment
pub trait Experiment {
    /// Short name used on the command line and in logs
    fn name(&self) -> &str;

    /// Run the experiment on a loaded table
    fn run(&self, table: &ObservationTable) -> Result<ExperimentOutcome>;
}

/// Derived table split into training and test blocks
struct Prepared {
    train: ObservationTable,
    test: ObservationTable,
}

/// Derive `spec` on `table`, keeping rows where `inputs` are also defined
fn prepare(
    table: &ObservationTable,
    spec: FeatureSpec,
    inputs: &[String],
    train_fraction: f64,
) -> Result<Prepared> {
    let derived = FeatureEngineer::new(spec)?.derive_with_inputs(table, inputs)?;
    let (train, test) = chronological_split(&derived, train_fraction)?;
    info!(train = train.len(), test = test.len(), "split derived table");
    Ok(Prepared { train, test })
}

fn outcome(
    name: &str,
    best_params: String,
    prepared: &Prepared,
    test_dates: Vec<NaiveDate>,
    actual: Vec<f64>,
    predicted: Vec<f64>,
    title: &str,
) -> Result<ExperimentOutcome> {
    let report = evaluate_lenient(&actual, &predicted)?;
    let train_dates = prepared.train.dates()?;
    let train_values = prepared.train.target()?;
    let chart_svg = forecast_chart(
        title,
        (&train_dates[..], &train_values[..]),
        (&test_dates[..], &actual[..]),
        &predicted,
    )?;
    Ok(ExperimentOutcome {
        name: name.to_string(),
        best_params,
        report,
        dates: test_dates,
        actual,
        predicted,
        chart_svg,
    })
}

/// Random forest on lag, rolling, calendar and weather features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestExperiment {
    pub train_fraction: f64,
    pub search: RandomSearchConfig,
    /// Use the weather columns present in the table as extra features
    pub include_weather: bool,
}

impl Default for ForestExperiment {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            search: RandomSearchConfig::default(),
            include_weather: true,
        }
    }
}

impl Experiment for ForestExperiment {
    fn name(&self) -> &str {
        "forest"
    }

    fn run(&self, table: &ObservationTable) -> Result<ExperimentOutcome> {
        let search = RandomizedSearch::new(self.search.clone())?;
        let spec = FeatureSpec::forest();
        let mut columns = spec.column_names(table.target_column());
        if self.include_weather {
            let present = table.column_names();
            for name in WEATHER_COLUMNS {
                if present.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                } else {
                    warn!(column = name, "weather column missing, forest runs without it");
                }
            }
        }

        let prepared = prepare(table, spec, &columns, self.train_fraction)?;
        let x_train = FeatureFrame::from_table(&prepared.train, &columns)?;
        let y_train = prepared.train.target()?;
        let x_test = FeatureFrame::from_table(&prepared.test, &columns)?;
        let y_test = prepared.test.target()?;

        let result = search.run(&x_train, &y_train)?;
        let predicted = result.model.predict(&x_test)?;
        outcome(
            self.name(),
            result.best.params.to_string(),
            &prepared,
            prepared.test.dates()?,
            y_test,
            predicted,
            "Optimized Random Forest Forecast",
        )
    }
}

/// Fit one SARIMA order on the training block and forecast the test block
fn sarima_forecast(
    order: SarimaOrder,
    config: SarimaConfig,
    x_train: &FeatureFrame,
    y_train: &[f64],
    x_test: &FeatureFrame,
) -> Result<Vec<f64>> {
    Sarima::with_config(order, config)?
        .fit(x_train, y_train)?
        .predict(x_test)
}

/// Training and test regressors of a SARIMA experiment
struct SarimaData {
    prepared: Prepared,
    x_train: FeatureFrame,
    y_train: Vec<f64>,
    x_test: FeatureFrame,
    y_test: Vec<f64>,
}

impl SarimaData {
    fn new(table: &ObservationTable, spec: FeatureSpec, train_fraction: f64) -> Result<Self> {
        let columns = spec.column_names(table.target_column());
        let prepared = prepare(table, spec, &[], train_fraction)?;
        Ok(Self {
            x_train: FeatureFrame::from_table(&prepared.train, &columns)?,
            y_train: prepared.train.target()?,
            x_test: FeatureFrame::from_table(&prepared.test, &columns)?,
            y_test: prepared.test.target()?,
            prepared,
        })
    }

    /// Negative test MSE of one order
    fn score(&self, order: SarimaOrder, config: SarimaConfig) -> Evaluation {
        Evaluation::from_result(
            sarima_forecast(order, config, &self.x_train, &self.y_train, &self.x_test)
                .and_then(|predicted| mean_squared_error(&self.y_test, &predicted))
                .map(|mse| -mse),
        )
    }

    fn finish(self, name: &str, order: SarimaOrder, config: SarimaConfig, title: &str) -> Result<ExperimentOutcome> {
        let predicted = sarima_forecast(order, config, &self.x_train, &self.y_train, &self.x_test)?;
        let dates = self.prepared.test.dates()?;
        outcome(name, order.to_string(), &self.prepared, dates, self.y_test.clone(), predicted, title)
    }
}

/// Exhaustive SARIMA order search with weekly lag and rolling regressors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaGridExperiment {
    pub train_fraction: f64,
    pub grid: SarimaGrid,
    pub sarima: SarimaConfig,
}

impl Default for SarimaGridExperiment {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            grid: SarimaGrid::default(),
            sarima: SarimaConfig::default(),
        }
    }
}

impl Experiment for SarimaGridExperiment {
    fn name(&self) -> &str {
        "sarima-grid"
    }

    fn run(&self, table: &ObservationTable) -> Result<ExperimentOutcome> {
        let search = GridSearch::new(self.grid.orders())?;
        let data = SarimaData::new(table, FeatureSpec::sarima_grid(), self.train_fraction)?;
        let best = search.run(|order| data.score(*order, self.sarima))?;
        info!(order = %best.params, mse = -best.score, "best grid order");
        data.finish(self.name(), best.params, self.sarima, "Optimized SARIMA Model Forecast")
    }
}

/// Search box of the Bayesian SARIMA experiment, each component rounded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaBounds {
    pub p: (f64, f64),
    pub d: (f64, f64),
    pub q: (f64, f64),
    pub seasonal_p: (f64, f64),
    pub seasonal_d: (f64, f64),
    pub seasonal_q: (f64, f64),
    pub period: usize,
}

impl Default for SarimaBounds {
    fn default() -> Self {
        Self {
            p: (0.0, 3.0),
            d: (0.0, 2.0),
            q: (0.0, 3.0),
            seasonal_p: (0.0, 2.0),
            seasonal_d: (0.0, 1.0),
            seasonal_q: (0.0, 2.0),
            period: WEEKLY_PERIOD,
        }
    }
}

impl SarimaBounds {
    fn bounds(&self) -> Vec<Bound> {
        vec![
            Bound::new("p", self.p.0, self.p.1),
            Bound::new("d", self.d.0, self.d.1),
            Bound::new("q", self.q.0, self.q.1),
            Bound::new("P", self.seasonal_p.0, self.seasonal_p.1),
            Bound::new("D", self.seasonal_d.0, self.seasonal_d.1),
            Bound::new("Q", self.seasonal_q.0, self.seasonal_q.1),
        ]
    }

    /// Order nearest to a raw search point
    pub fn order_at(&self, point: &[f64]) -> Result<SarimaOrder> {
        if point.len() != 6 {
            return Err(ForecastError::ValidationError(format!(
                "A SARIMA point has 6 coordinates, got {}",
                point.len()
            )));
        }
        let r = |v: f64| v.round().max(0.0) as usize;
        Ok(SarimaOrder::new(r(point[0]), r(point[1]), r(point[2]))
            .with_seasonal(r(point[3]), r(point[4]), r(point[5]), self.period))
    }
}

/// Bayesian SARIMA order search with weekly and fortnightly regressors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaBayesExperiment {
    pub train_fraction: f64,
    pub bounds: SarimaBounds,
    pub optimizer: BayesianConfig,
    pub sarima: SarimaConfig,
}

impl Default for SarimaBayesExperiment {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            bounds: SarimaBounds::default(),
            optimizer: BayesianConfig::default(),
            sarima: SarimaConfig::default(),
        }
    }
}

impl Experiment for SarimaBayesExperiment {
    fn name(&self) -> &str {
        "sarima-bayes"
    }

    fn run(&self, table: &ObservationTable) -> Result<ExperimentOutcome> {
        let optimizer = BayesianOptimizer::new(self.bounds.bounds(), self.optimizer.clone())?;
        let data = SarimaData::new(table, FeatureSpec::sarima_bayes(), self.train_fraction)?;
        let result = optimizer.maximize(|point| match self.bounds.order_at(point) {
            Ok(order) => data.score(order, self.sarima),
            Err(e) => Evaluation::Failed(e.to_string()),
        })?;
        let order = self.bounds.order_at(&result.best.params)?;
        info!(order = %order, mse = -result.best.score, "best bayesian order");
        data.finish(
            self.name(),
            order,
            self.sarima,
            "Optimized SARIMA with Bayesian Hyperparameter Tuning",
        )
    }
}

/// Search box of the LSTM experiment; units and batch size are truncated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmBounds {
    pub units: (f64, f64),
    pub dropout: (f64, f64),
    pub learning_rate: (f64, f64),
    pub batch_size: (f64, f64),
}

impl Default for LstmBounds {
    fn default() -> Self {
        Self {
            units: (50.0, 200.0),
            dropout: (0.1, 0.5),
            learning_rate: (1e-4, 1e-2),
            batch_size: (8.0, 32.0),
        }
    }
}

impl LstmBounds {
    fn bounds(&self) -> Vec<Bound> {
        vec![
            Bound::new("units", self.units.0, self.units.1),
            Bound::new("dropout", self.dropout.0, self.dropout.1),
            Bound::new("learning_rate", self.learning_rate.0, self.learning_rate.1),
            Bound::new("batch_size", self.batch_size.0, self.batch_size.1),
        ]
    }

    /// Network settings at a raw search point
    pub fn config_at(&self, point: &[f64], base: &LstmConfig) -> Result<LstmConfig> {
        if point.len() != 4 {
            return Err(ForecastError::ValidationError(format!(
                "An LSTM point has 4 coordinates, got {}",
                point.len()
            )));
        }
        Ok(LstmConfig {
            units: point[0].max(1.0) as usize,
            dropout: point[1],
            learning_rate: point[2],
            batch_size: point[3].max(1.0) as usize,
            ..base.clone()
        })
    }
}

/// Stacked LSTM over standardised channels, tuned by Bayesian search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmExperiment {
    pub train_fraction: f64,
    pub bounds: LstmBounds,
    pub optimizer: BayesianConfig,
    /// Settings shared by every trial; `epochs` is the per-trial budget
    pub network: LstmConfig,
    /// Epoch budget of the final retraining
    pub final_epochs: usize,
}

impl Default for LstmExperiment {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            bounds: LstmBounds::default(),
            optimizer: BayesianConfig {
                init_points: 3,
                n_iter: 5,
                ..Default::default()
            },
            network: LstmConfig {
                epochs: 50,
                ..Default::default()
            },
            final_epochs: 100,
        }
    }
}

impl Experiment for LstmExperiment {
    fn name(&self) -> &str {
        "lstm"
    }

    fn run(&self, table: &ObservationTable) -> Result<ExperimentOutcome> {
        if self.final_epochs == 0 {
            return Err(ForecastError::ConfigError(
                "The final LSTM needs a positive epoch budget".to_string(),
            ));
        }
        let optimizer = BayesianOptimizer::new(self.bounds.bounds(), self.optimizer.clone())?;
        let spec = FeatureSpec::lstm();
        let mut channels = vec![table.target_column().to_string()];
        channels.extend(spec.column_names(table.target_column()));
        let prepared = prepare(table, spec, &[], self.train_fraction)?;

        // target is channel 0
        let train_rows = prepared.train.feature_matrix(&channels)?;
        let test_rows = prepared.test.feature_matrix(&channels)?;
        let scaler = StandardScaler::fit(&train_rows)?;
        let scaled_train = scaler.transform(&train_rows)?;
        let scaled_test = scaler.transform(&test_rows)?;
        let y_train: Vec<f64> = scaled_train.iter().map(|row| row[0]).collect();
        let x_train = FeatureFrame::new(channels.clone(), scaled_train)?;
        let x_test = FeatureFrame::new(channels, scaled_test)?;

        let result = optimizer.maximize(|point| {
            Evaluation::from_result(
                self.bounds
                    .config_at(point, &self.network)
                    .and_then(LstmRegressor::new)
                    .and_then(|model| model.fit(&x_train, &y_train))
                    .and_then(|fitted| {
                        fitted.history().best_validation_loss().ok_or_else(|| {
                            ForecastError::FitError("LSTM recorded no validation loss".to_string())
                        })
                    })
                    .map(|loss| -loss),
            )
        })?;

        let best = LstmConfig {
            epochs: self.final_epochs,
            ..self.bounds.config_at(&result.best.params, &self.network)?
        };
        info!(config = %best, val_loss = -result.best.score, "best lstm configuration");
        let fitted = LstmRegressor::new(best.clone())?.fit(&x_train, &y_train)?;
        let scaled_predictions = fitted.predict(&x_test)?;
        let predicted = scaler.inverse_transform_column(0, &scaled_predictions)?;

        let window = best.window;
        let actual = prepared.test.target()?[window..].to_vec();
        let dates = prepared.test.dates()?[window..].to_vec();
        outcome(
            self.name(),
            best.to_string(),
            &prepared,
            dates,
            actual,
            predicted,
            "Optimized LSTM Model Forecast",
        )
    }
}

/// Configuration of every experiment, each overridable from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentsConfig {
    pub forest: ForestExperiment,
    pub sarima_grid: SarimaGridExperiment,
    pub sarima_bayes: SarimaBayesExperiment,
    pub lstm: LstmExperiment,
}

impl ExperimentsConfig {
    /// Load overrides from a JSON file; absent fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting that can be checked before data is seen
    pub fn validate(&self) -> Result<()> {
        for fraction in [
            self.forest.train_fraction,
            self.sarima_grid.train_fraction,
            self.sarima_bayes.train_fraction,
            self.lstm.train_fraction,
        ] {
            // NaN fails both comparisons
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(ForecastError::ConfigError(format!(
                    "Training fraction must lie strictly between 0 and 1, got {}",
                    fraction
                )));
            }
        }
        RandomizedSearch::new(self.forest.search.clone())?;
        GridSearch::new(self.sarima_grid.grid.orders())?;
        BayesianOptimizer::new(self.sarima_bayes.bounds.bounds(), self.sarima_bayes.optimizer.clone())?;
        BayesianOptimizer::new(self.lstm.bounds.bounds(), self.lstm.optimizer.clone())?;
        self.lstm.network.validate()?;
        if self.lstm.final_epochs == 0 {
            return Err(ForecastError::ConfigError(
                "The final LSTM needs a positive epoch budget".to_string(),
            ));
        }
        Ok(())
    }

    /// Every experiment in running order
    pub fn experiments(&self) -> Vec<Box<dyn Experiment>> {
        vec![
            Box::new(self.forest.clone()),
            Box::new(self.sarima_grid.clone()),
            Box::new(self.sarima_bayes.clone()),
            Box::new(self.lstm.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bayesian_points_round_to_orders() {
        let order = SarimaBounds::default()
            .order_at(&[2.6, 0.4, 1.5, 0.2, 0.9, 1.49])
            .unwrap();
        assert_eq!(order, SarimaOrder::new(3, 0, 2).with_seasonal(0, 1, 1, 7));
    }

    #[test]
    fn lstm_points_truncate_integers() {
        let config = LstmBounds::default()
            .config_at(&[127.9, 0.25, 0.003, 15.7], &LstmConfig::default())
            .unwrap();
        assert_eq!(config.units, 127);
        assert_eq!(config.batch_size, 15);
        assert_eq!(config.window, 30);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ExperimentsConfig =
            serde_json::from_str(r#"{"lstm": {"final_epochs": 20}}"#).unwrap();
        assert_eq!(config.lstm.final_epochs, 20);
        assert_eq!(config.lstm.network.epochs, 50);
        assert_eq!(config.forest, ForestExperiment::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn names_match_the_command_line() {
        let names: Vec<String> = ExperimentsConfig::default()
            .experiments()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["forest", "sarima-grid", "sarima-bayes", "lstm"]);
    }

    #[test]
    fn any_open_unit_fraction_is_a_valid_config() {
        let mut config = ExperimentsConfig::default();
        config.forest.train_fraction = 0.001;
        config.lstm.train_fraction = 0.999;
        assert!(config.validate().is_ok());

        for bad in [0.0, 1.0, -0.2, f64::NAN] {
            config.sarima_grid.train_fraction = bad;
            assert!(matches!(config.validate(), Err(ForecastError::ConfigError(_))));
        }
    }
}
