use clap::Parser;
use precip_forecast::data::DataLoader;
use precip_forecast::experiments::{ExperimentOutcome, ExperimentsConfig};
use precip_forecast::ForecastError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

/// Run the precipitation forecasting experiments on a daily CSV table
#[derive(Parser, Debug)]
#[command(name = "precip_experiments")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tune and evaluate the precipitation forecasting experiments")]
struct Args {
    /// Daily CSV with a date column and the Precipit target
    data: PathBuf,

    /// JSON file overriding experiment settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for SVG charts and prediction CSVs
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Run only these experiments (forest, sarima-grid, sarima-bayes, lstm)
    #[arg(long)]
    only: Vec<String>,
}

fn save(outcome: &ExperimentOutcome, dir: &Path) -> Result<(), ForecastError> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(format!("{}.svg", outcome.name)), &outcome.chart_svg)?;

    let mut writer = csv::Writer::from_path(dir.join(format!("{}_predictions.csv", outcome.name)))?;
    writer.write_record(["date", "actual", "predicted"])?;
    for ((date, actual), predicted) in outcome.dates.iter().zip(&outcome.actual).zip(&outcome.predicted) {
        writer.write_record([date.to_string(), actual.to_string(), predicted.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn run(args: Args) -> Result<(), ForecastError> {
    let config = match &args.config {
        Some(path) => ExperimentsConfig::from_json_file(path)?,
        None => ExperimentsConfig::default(),
    };
    let experiments = config.experiments();
    if let Some(unknown) = args
        .only
        .iter()
        .find(|name| !experiments.iter().any(|e| e.name() == name.as_str()))
    {
        return Err(ForecastError::ConfigError(format!("Unknown experiment '{}'", unknown)));
    }

    let table = DataLoader::from_csv(&args.data)?;
    info!(rows = table.len(), path = %args.data.display(), "loaded daily table");

    let mut failures = 0;
    for experiment in experiments
        .iter()
        .filter(|e| args.only.is_empty() || args.only.iter().any(|name| name == e.name()))
    {
        info!(experiment = experiment.name(), "running");
        match experiment.run(&table) {
            Ok(outcome) => {
                println!("{} ({})", outcome.name, outcome.best_params);
                println!("{}", outcome.report);
                if let Some(dir) = &args.out {
                    save(&outcome, dir)?;
                }
            }
            Err(e) => {
                error!(experiment = experiment.name(), error = %e, "experiment failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(ForecastError::FitError(format!("{} experiment(s) failed", failures)));
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "precip_forecast=info,precip_experiments=info".into()),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!(error = %e, "run failed");
        process::exit(1);
    }
}
