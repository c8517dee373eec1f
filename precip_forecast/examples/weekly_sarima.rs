use precip_forecast::experiments::{Experiment, SarimaGridExperiment};
use precip_forecast::search::SarimaGrid;
use precip_forecast::synthetic::SyntheticSeries;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Precip Forecast: Weekly SARIMA Example");
    println!("======================================\n");

    // Weekly cycle with a little noise
    let table = SyntheticSeries {
        days: 400,
        noise_std: 0.5,
        ..Default::default()
    }
    .generate()?;
    println!("Generated {} daily observations\n", table.len());

    // Small grid so the example finishes quickly
    let experiment = SarimaGridExperiment {
        grid: SarimaGrid {
            max_p: 1,
            max_d: 0,
            max_q: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let outcome = experiment.run(&table)?;

    println!("Best order: {}", outcome.best_params);
    println!("{}", outcome.report);

    println!("First forecasts:");
    for ((date, actual), predicted) in outcome
        .dates
        .iter()
        .zip(&outcome.actual)
        .zip(&outcome.predicted)
        .take(7)
    {
        println!("  {}: actual {:.2}, predicted {:.2}", date, actual, predicted);
    }

    std::fs::write("weekly_sarima.svg", &outcome.chart_svg)?;
    println!("\nChart written to weekly_sarima.svg");
    Ok(())
}
