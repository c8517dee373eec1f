//! Forecast charts
//!
//! Charts are rendered to SVG text in memory; writing them anywhere is left
//! to the caller.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use plotters::coord::types::RangedDateTime;
use plotters::prelude::*;

/// Chart size in pixels
pub const CHART_SIZE: (u32, u32) = (1000, 600);

pub const TRAIN_COLOUR: (u8, u8, u8) = (31, 119, 180);
pub const TEST_COLOUR: (u8, u8, u8) = (255, 127, 14);
pub const PREDICTED_COLOUR: (u8, u8, u8) = (214, 39, 40);

/// One labelled line of a chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    pub colour: (u8, u8, u8),
    pub points: Vec<(NaiveDate, f64)>,
}

impl ChartSeries {
    /// Pair dates with values, failing when their lengths differ
    pub fn new(label: &str, colour: (u8, u8, u8), dates: &[NaiveDate], values: &[f64]) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::ValidationError(format!(
                "Series '{}' has {} dates but {} values",
                label,
                dates.len(),
                values.len()
            )));
        }
        Ok(Self {
            label: label.to_string(),
            colour,
            points: dates.iter().copied().zip(values.iter().copied()).collect(),
        })
    }
}

fn midnight(date: NaiveDate) -> Result<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| ForecastError::PlotError(format!("Cannot place {} on the time axis", date)))
}

fn plot_error<E: std::fmt::Display>(e: E) -> ForecastError {
    ForecastError::PlotError(e.to_string())
}

/// Render line series over a shared date axis as an SVG document
pub fn render_svg(title: &str, series: &[ChartSeries]) -> Result<String> {
    type Extent = ((NaiveDate, NaiveDate), (f64, f64));
    if series.iter().flat_map(|s| &s.points).any(|(_, v)| !v.is_finite()) {
        return Err(ForecastError::ValidationError(
            "Chart values must be finite".to_string(),
        ));
    }
    let points = series.iter().flat_map(|s| s.points.iter());
    let Some(((min_date, max_date), (min_value, max_value))) = points.fold(None::<Extent>, |acc, (date, value)| {
        let ((lo_d, hi_d), (lo_v, hi_v)) = acc.unwrap_or(((*date, *date), (*value, *value)));
        Some((
            (lo_d.min(*date), hi_d.max(*date)),
            (lo_v.min(*value), hi_v.max(*value)),
        ))
    }) else {
        return Err(ForecastError::ValidationError(
            "A chart needs at least one point".to_string(),
        ));
    };

    let start = midnight(min_date)?;
    let end = if max_date > min_date {
        midnight(max_date)?
    } else {
        midnight(min_date + Duration::days(1))?
    };
    let padding = if (max_value - min_value).abs() > 1e-6 {
        (max_value - min_value) * 0.1
    } else {
        1.0
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(
                RangedDateTime::from(start..end),
                (min_value - padding)..(max_value + padding),
            )
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Precipitation")
            .x_label_formatter(&|dt: &NaiveDateTime| dt.format("%Y-%m-%d").to_string())
            .light_line_style(BLACK.mix(0.1))
            .draw()
            .map_err(plot_error)?;

        for line in series {
            let colour = RGBColor(line.colour.0, line.colour.1, line.colour.2);
            let data = line
                .points
                .iter()
                .map(|(date, value)| midnight(*date).map(|dt| (dt, *value)))
                .collect::<Result<Vec<_>>>()?;
            chart
                .draw_series(LineSeries::new(data, colour.stroke_width(2)))
                .map_err(plot_error)?
                .label(line.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], colour));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_error)?;
        root.present().map_err(plot_error)?;
    }
    Ok(svg)
}

/// Training history, held-out actuals and predictions on one chart
pub fn forecast_chart(
    title: &str,
    train: (&[NaiveDate], &[f64]),
    test: (&[NaiveDate], &[f64]),
    predicted: &[f64],
) -> Result<String> {
    let series = [
        ChartSeries::new("Train", TRAIN_COLOUR, train.0, train.1)?,
        ChartSeries::new("Test", TEST_COLOUR, test.0, test.1)?,
        ChartSeries::new("Predicted", PREDICTED_COLOUR, test.0, predicted)?,
    ];
    render_svg(title, &series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn renders_an_svg_document() {
        let index = dates(10);
        let values: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let svg = forecast_chart(
            "Forecast",
            (&index[..8], &values[..8]),
            (&index[8..], &values[8..]),
            &[4.1, 4.4],
        )
        .unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Predicted"));
    }

    #[test]
    fn misaligned_series_are_rejected() {
        let result = ChartSeries::new("x", TRAIN_COLOUR, &dates(3), &[1.0, 2.0]);
        assert!(matches!(result, Err(ForecastError::ValidationError(_))));
    }

    #[test]
    fn empty_chart_is_rejected() {
        assert!(matches!(
            render_svg("empty", &[]),
            Err(ForecastError::ValidationError(_))
        ));
    }
}
