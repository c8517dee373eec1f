use precip_forecast::data::DataLoader;
use precip_forecast::experiments::{
    Experiment, ExperimentsConfig, ForestExperiment, LstmBounds, LstmExperiment, SarimaBayesExperiment,
    SarimaBounds, SarimaGridExperiment,
};
use precip_forecast::metrics::mean_squared_error;
use precip_forecast::models::lstm::LstmConfig;
use precip_forecast::search::random::RandomSearchConfig;
use precip_forecast::search::{BayesianConfig, ParamGrid, SarimaGrid};
use precip_forecast::synthetic::SyntheticSeries;
use precip_forecast::ObservationTable;
use std::io::Write;
use tempfile::NamedTempFile;

fn weekly_table(weather: bool) -> ObservationTable {
    SyntheticSeries {
        days: 400,
        noise_std: 0.3,
        weather,
        ..Default::default()
    }
    .generate()
    .unwrap()
}

fn mean_baseline(table: &ObservationTable, actual: &[f64]) -> f64 {
    let values = table.target().unwrap();
    let train = &values[..values.len() - actual.len()];
    let mean = train.iter().sum::<f64>() / train.len() as f64;
    mean_squared_error(actual, &vec![mean; actual.len()]).unwrap()
}

#[test]
fn test_sarima_grid_experiment_end_to_end() {
    let table = weekly_table(false);
    let experiment = SarimaGridExperiment {
        grid: SarimaGrid {
            max_p: 1,
            max_d: 0,
            max_q: 0,
            max_seasonal_p: 0,
            max_seasonal_d: 1,
            max_seasonal_q: 0,
            ..Default::default()
        },
        ..Default::default()
    };

    let outcome = experiment.run(&table).unwrap();

    assert_eq!(outcome.name, "sarima-grid");
    assert_eq!(outcome.actual.len(), outcome.predicted.len());
    assert_eq!(outcome.dates.len(), outcome.actual.len());
    assert!(outcome.report.mse < mean_baseline(&table, &outcome.actual));
    assert!(outcome.report.r2.unwrap() > 0.0);
    assert!(outcome.chart_svg.contains("<svg"));
}

#[test]
fn test_sarima_bayes_experiment_rounds_orders() {
    let experiment = SarimaBayesExperiment {
        bounds: SarimaBounds {
            p: (0.0, 1.0),
            d: (0.0, 0.4),
            q: (0.0, 1.0),
            seasonal_p: (0.0, 0.4),
            seasonal_d: (0.0, 1.0),
            seasonal_q: (0.0, 0.4),
            ..Default::default()
        },
        optimizer: BayesianConfig {
            init_points: 3,
            n_iter: 2,
            n_candidates: 100,
            ..Default::default()
        },
        ..Default::default()
    };

    let outcome = experiment.run(&weekly_table(false)).unwrap();

    assert!(outcome.best_params.starts_with('('));
    assert!(outcome.best_params.ends_with(", 7)"));
    assert!(outcome.report.mse.is_finite());
}

#[test]
fn test_forest_experiment_uses_weather_columns() {
    let table = weekly_table(true);
    let experiment = ForestExperiment {
        search: RandomSearchConfig {
            grid: ParamGrid {
                n_estimators: vec![10],
                max_depth: vec![Some(6)],
                min_samples_split: vec![2, 5],
                min_samples_leaf: vec![1],
            },
            n_iter: 2,
            folds: 3,
            ..Default::default()
        },
        ..Default::default()
    };

    let outcome = experiment.run(&table).unwrap();

    assert!(outcome.best_params.contains("n_estimators=10"));
    assert!(outcome.report.mse < mean_baseline(&table, &outcome.actual));
}

#[test]
fn test_lstm_experiment_aligns_with_the_window() {
    let table = weekly_table(false);
    let experiment = LstmExperiment {
        bounds: LstmBounds {
            units: (4.0, 8.0),
            batch_size: (16.0, 32.0),
            ..Default::default()
        },
        optimizer: BayesianConfig {
            init_points: 1,
            n_iter: 0,
            ..Default::default()
        },
        network: LstmConfig {
            window: 7,
            epochs: 2,
            ..Default::default()
        },
        final_epochs: 2,
        ..Default::default()
    };

    let outcome = experiment.run(&table).unwrap();

    // 400 rows, 30 warm-up rows, 80/20 split, 7-step windows
    assert_eq!(outcome.actual.len(), 74 - 7);
    assert_eq!(outcome.predicted.len(), outcome.actual.len());
    assert!(outcome.predicted.iter().all(|p| p.is_finite()));
}

#[test]
fn test_config_overrides_from_json() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"sarima_grid": {{"grid": {{"max_p": 1}}}}, "lstm": {{"optimizer": {{"n_iter": 2}}}}}}"#
    )
    .unwrap();

    let config = ExperimentsConfig::from_json_file(file.path()).unwrap();

    assert_eq!(config.sarima_grid.grid.max_p, 1);
    assert_eq!(config.sarima_grid.grid.max_d, 2);
    assert_eq!(config.lstm.optimizer.n_iter, 2);
    assert_eq!(config.lstm.network.epochs, 50);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"forest": {{"train_fraction": 1.5}}}}"#).unwrap();
    assert!(ExperimentsConfig::from_json_file(file.path()).is_err());
}

#[test]
fn test_csv_to_experiment() {
    let table = weekly_table(false);
    let dates = table.dates().unwrap();
    let values = table.target().unwrap();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date,Precipit").unwrap();
    for (date, value) in dates.iter().zip(&values) {
        writeln!(file, "{},{}", date, value).unwrap();
    }

    let loaded = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(loaded.len(), 400);

    let experiment = SarimaGridExperiment {
        grid: SarimaGrid {
            max_p: 0,
            max_d: 0,
            max_q: 0,
            max_seasonal_p: 0,
            max_seasonal_d: 0,
            max_seasonal_q: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    let outcome = experiment.run(&loaded).unwrap();
    assert_eq!(outcome.best_params, "(0, 0, 0)x(0, 0, 0, 7)");
}
