//! Seeded synthetic daily tables for demos and tests

use crate::data::{ObservationTable, TARGET_COLUMN, WEATHER_COLUMNS};
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Weekly sinusoid around a level, with Gaussian noise
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSeries {
    pub days: usize,
    pub start: NaiveDate,
    pub level: f64,
    pub amplitude: f64,
    pub noise_std: f64,
    pub seed: u64,
    /// Add the twelve weather columns as noisy functions of the cycle
    pub weather: bool,
}

impl Default for SyntheticSeries {
    fn default() -> Self {
        Self {
            days: 400,
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            level: 5.0,
            amplitude: 3.0,
            noise_std: 0.3,
            seed: 42,
            weather: false,
        }
    }
}

impl SyntheticSeries {
    /// Noise-free value on day `i`
    pub fn signal(&self, i: usize) -> f64 {
        self.level + self.amplitude * (2.0 * PI * i as f64 / 7.0).sin()
    }

    /// Build the table
    pub fn generate(&self) -> Result<ObservationTable> {
        if self.days == 0 {
            return Err(ForecastError::InvalidParameter(
                "A synthetic series needs at least one day".to_string(),
            ));
        }
        let noise = Normal::new(0.0, self.noise_std).map_err(|e| {
            ForecastError::InvalidParameter(format!("Invalid noise deviation {}: {}", self.noise_std, e))
        })?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let dates: Vec<NaiveDate> = (0..self.days)
            .map(|i| self.start + Duration::days(i as i64))
            .collect();
        let values: Vec<f64> = (0..self.days)
            .map(|i| self.signal(i) + noise.sample(&mut rng))
            .collect();
        let mut table = ObservationTable::from_series(dates, TARGET_COLUMN, values)?;

        if self.weather {
            for (k, name) in WEATHER_COLUMNS.iter().enumerate() {
                let base = 10.0 + 5.0 * k as f64;
                let column: Vec<Option<f64>> = (0..self.days)
                    .map(|i| {
                        let phase = 2.0 * PI * i as f64 / 7.0;
                        Some(base + phase.cos() + noise.sample(&mut rng))
                    })
                    .collect();
                table = table.with_column(name, column)?;
            }
        }
        Ok(table)
    }
}
