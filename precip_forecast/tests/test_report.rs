use chrono::{Duration, NaiveDate};
use precip_forecast::report::{forecast_chart, render_svg, ChartSeries, TRAIN_COLOUR};
use precip_forecast::ForecastError;

fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
}

#[test]
fn test_forecast_chart_contains_every_series() {
    let index = dates(30);
    let values: Vec<f64> = (0..30).map(|i| (i as f64 / 3.0).sin() + 2.0).collect();
    let svg = forecast_chart(
        "Optimized SARIMA Model Forecast",
        (&index[..24], &values[..24]),
        (&index[24..], &values[24..]),
        &values[24..].iter().map(|v| v + 0.1).collect::<Vec<_>>(),
    )
    .unwrap();

    assert!(svg.contains("<svg"));
    for label in ["Train", "Test", "Predicted"] {
        assert!(svg.contains(label), "missing {}", label);
    }
}

#[test]
fn test_single_point_chart_renders() {
    let series = ChartSeries::new("only", TRAIN_COLOUR, &dates(1), &[3.0]).unwrap();
    assert!(render_svg("one", &[series]).is_ok());
}

#[test]
fn test_prediction_length_must_match_test_dates() {
    let index = dates(10);
    let values = vec![1.0; 10];
    let result = forecast_chart("bad", (&index[..8], &values[..8]), (&index[8..], &values[8..]), &[1.0]);
    assert!(matches!(result, Err(ForecastError::ValidationError(_))));
}

#[test]
fn test_non_finite_values_are_rejected() {
    let series = ChartSeries::new("nan", TRAIN_COLOUR, &dates(2), &[1.0, f64::NAN]).unwrap();
    assert!(render_svg("nan", &[series]).is_err());
}
