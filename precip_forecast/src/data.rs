//! Daily weather tables for forecasting

use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

/// Name of the date index column
pub const DATE_COLUMN: &str = "Date";

/// Name of the precipitation target column
pub const TARGET_COLUMN: &str = "Precipit";

/// Auxiliary weather measurements present in the daily dataset
pub const WEATHER_COLUMNS: [&str; 12] = [
    "Temp_max", "Temp_avg", "Temp_min", "Hum_max", "Hum_avg", "Hum_min", "Wind_max", "Wind_avg",
    "Wind_min", "Press_max", "Press_avg", "Press_min",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Date-indexed table of daily observations
///
/// Every transformation returns a new table; a table is never modified in place.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    /// Data frame holding the date index and the numeric columns
    df: DataFrame,
    /// Name of the target column
    target_column: String,
}

/// Data loader for daily observation tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a daily table from a CSV file, targeting `Precipit`
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<ObservationTable> {
        Self::from_csv_with_target(path, TARGET_COLUMN)
    }

    /// Load a daily table from a CSV file with an explicit target column
    pub fn from_csv_with_target<P: AsRef<Path>>(path: P, target: &str) -> Result<ObservationTable> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        info!(path = %path.display(), rows = df.height(), "loaded csv");
        Self::from_dataframe(df, target)
    }

    /// Build a daily table from an existing DataFrame
    ///
    /// Missing target values are treated as zero. Rows are sorted by date and
    /// duplicate dates are rejected.
    pub fn from_dataframe(df: DataFrame, target: &str) -> Result<ObservationTable> {
        let date_column = Self::detect_date_column(&df)?;
        let dates = parse_dates(df.column(&date_column)?)?;

        let target_series = df.column(target).map_err(|_| {
            ForecastError::DataError(format!("Required column '{}' not found", target))
        })?;
        if !target_series.dtype().is_numeric() {
            return Err(ForecastError::DataError(format!(
                "Target column '{}' is not numeric",
                target
            )));
        }
        let target_values: Vec<f64> = target_series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();

        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);
        for pair in order.windows(2) {
            if dates[pair[0]] == dates[pair[1]] {
                return Err(ForecastError::DataError(format!(
                    "Duplicate date {} in index",
                    dates[pair[0]]
                )));
            }
        }

        let sorted_dates: Vec<NaiveDate> = order.iter().map(|&i| dates[i]).collect();
        let mut table = ObservationTable::from_series(
            sorted_dates,
            target,
            order.iter().map(|&i| target_values[i]).collect(),
        )?;

        for series in df.get_columns() {
            let name = series.name();
            if name == date_column || name == target {
                continue;
            }
            if !series.dtype().is_numeric() {
                warn!(column = name, dtype = %series.dtype(), "skipping non-numeric column");
                continue;
            }
            let values: Vec<Option<f64>> = series.cast(&DataType::Float64)?.f64()?.into_iter().collect();
            table = table.with_column(name, order.iter().map(|&i| values[i]).collect())?;
        }

        debug!(columns = ?table.column_names(), "observation table ready");
        Ok(table)
    }

    /// Detect the date column in a DataFrame
    fn detect_date_column(df: &DataFrame) -> Result<String> {
        let column_names = df.get_column_names();

        if column_names.iter().any(|name| *name == DATE_COLUMN) {
            return Ok(DATE_COLUMN.to_string());
        }
        for name in &column_names {
            if name.to_lowercase().contains("date") {
                return Ok(name.to_string());
            }
        }

        Err(ForecastError::DataError(
            "No date column found in data".to_string(),
        ))
    }
}

/// Parse a date column stored either as text or as a polars date
fn parse_dates(series: &Series) -> Result<Vec<NaiveDate>> {
    match series.dtype() {
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                let text = value.ok_or_else(|| {
                    ForecastError::DataError(format!("Missing date at row {}", row))
                })?;
                parse_date(text)
            })
            .collect(),
        DataType::Date => series
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value
                    .and_then(days_to_date)
                    .ok_or_else(|| ForecastError::DataError(format!("Missing date at row {}", row)))
            })
            .collect(),
        other => Err(ForecastError::DataError(format!(
            "Date column has unsupported type {}",
            other
        ))),
    }
}

/// Parse a single calendar date in one of the accepted formats
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    // timestamps such as "2016-01-01 00:00:00" keep only their date part
    let date_part = trimmed.split([' ', 'T']).next().unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .ok_or_else(|| ForecastError::DataError(format!("Unparseable date '{}'", text)))
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn date_to_days(date: NaiveDate) -> i32 {
    date.signed_duration_since(epoch()).num_days() as i32
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    if days >= 0 {
        epoch().checked_add_days(Days::new(days as u64))
    } else {
        epoch().checked_sub_days(Days::new(days.unsigned_abs() as u64))
    }
}

impl ObservationTable {
    /// Create a table from a date index and a target series
    ///
    /// Dates must be strictly increasing.
    pub fn from_series(dates: Vec<NaiveDate>, target: &str, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::ValidationError(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }
        if target == DATE_COLUMN {
            return Err(ForecastError::InvalidParameter(format!(
                "Target column cannot be named '{}'",
                DATE_COLUMN
            )));
        }
        if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(ForecastError::DataError(format!(
                "Date index must be strictly increasing ({} is followed by {})",
                pair[0], pair[1]
            )));
        }

        let days: Vec<i32> = dates.iter().map(|d| date_to_days(*d)).collect();
        let date_series = Series::new(DATE_COLUMN, days).cast(&DataType::Date)?;
        let target_series = Series::new(target, values);
        let df = DataFrame::new(vec![date_series, target_series])?;

        Ok(Self {
            df,
            target_column: target.to_string(),
        })
    }

    /// Return a new table with `name` added (or replaced)
    pub fn with_column(&self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        if name == DATE_COLUMN {
            return Err(ForecastError::InvalidParameter(format!(
                "Column '{}' is reserved for the date index",
                DATE_COLUMN
            )));
        }
        if values.len() != self.len() {
            return Err(ForecastError::ValidationError(format!(
                "Column '{}' has {} values but the table has {} rows",
                name,
                values.len(),
                self.len()
            )));
        }

        let mut df = self.df.clone();
        df.with_column(Series::new(name, values))?;
        Ok(Self {
            df,
            target_column: self.target_column.clone(),
        })
    }

    /// Return a new table keeping only the date index, the target and `names`
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        self.require_columns(names)?;
        let mut keep: Vec<&str> = vec![DATE_COLUMN, self.target_column.as_str()];
        keep.extend(names.iter().filter(|n| **n != self.target_column));
        Ok(Self {
            df: self.df.select(keep)?,
            target_column: self.target_column.clone(),
        })
    }

    /// Return a new table without any row holding an undefined value
    pub fn drop_undefined(&self) -> Result<Self> {
        let df = self.df.drop_nulls::<String>(None)?;
        Ok(Self {
            df,
            target_column: self.target_column.clone(),
        })
    }

    /// Return a new table without the rows where any of `names` is undefined.
    /// Gaps in other columns are kept.
    pub fn drop_undefined_in(&self, names: &[&str]) -> Result<Self> {
        self.require_columns(names)?;
        let df = self.df.drop_nulls(Some(names))?;
        Ok(Self {
            df,
            target_column: self.target_column.clone(),
        })
    }

    /// Whether any cell of the table is undefined
    pub fn has_undefined(&self) -> bool {
        self.df.get_columns().iter().any(|s| s.null_count() > 0)
    }

    /// Rows `start..start + len`
    pub fn slice(&self, start: usize, len: usize) -> Self {
        Self {
            df: self.df.slice(start as i64, len),
            target_column: self.target_column.clone(),
        }
    }

    /// Fail with a data error naming every missing column
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        let present = self.df.get_column_names();
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !present.contains(name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ForecastError::DataError(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )))
        }
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the target column name
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Names of every value column (the date index excluded)
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .filter(|name| *name != DATE_COLUMN)
            .map(str::to_string)
            .collect()
    }

    /// The date index
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        parse_dates(self.df.column(DATE_COLUMN)?)
    }

    /// A column with undefined cells kept as `None`
    pub fn column_opt(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.df.column(name).map_err(|_| {
            ForecastError::DataError(format!("Column '{}' not found", name))
        })?;
        Ok(series.cast(&DataType::Float64)?.f64()?.into_iter().collect())
    }

    /// A fully defined column
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        self.column_opt(name)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Column '{}' is undefined at row {}",
                        name, row
                    ))
                })
            })
            .collect()
    }

    /// The target series
    pub fn target(&self) -> Result<Vec<f64>> {
        self.column(&self.target_column)
    }

    /// Row-major matrix of the named columns
    pub fn feature_matrix(&self, names: &[String]) -> Result<Vec<Vec<f64>>> {
        let columns = names
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;
        Ok((0..self.len())
            .map(|row| columns.iter().map(|col| col[row]).collect())
            .collect())
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
        (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect()
    }

    #[test]
    fn dates_round_trip_through_the_frame() {
        let index = dates(5);
        let table = ObservationTable::from_series(index.clone(), TARGET_COLUMN, vec![0.0; 5]).unwrap();
        assert_eq!(table.dates().unwrap(), index);
    }

    #[test]
    fn pre_epoch_dates_are_supported() {
        let d = NaiveDate::from_ymd_opt(1965, 3, 2).unwrap();
        assert_eq!(days_to_date(date_to_days(d)), Some(d));
    }

    #[test]
    fn with_column_does_not_touch_the_source() {
        let table = ObservationTable::from_series(dates(3), TARGET_COLUMN, vec![1.0, 2.0, 3.0]).unwrap();
        let extended = table.with_column("x", vec![None, Some(1.0), Some(2.0)]).unwrap();

        assert_eq!(table.column_names(), vec![TARGET_COLUMN.to_string()]);
        assert_eq!(extended.column_names().len(), 2);
        assert!(extended.has_undefined());
        assert_eq!(extended.drop_undefined().unwrap().len(), 2);
    }

    #[test]
    fn drop_undefined_in_ignores_other_columns() {
        let table = ObservationTable::from_series(dates(4), TARGET_COLUMN, vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .with_column("x", vec![None, Some(1.0), Some(2.0), Some(3.0)])
            .unwrap()
            .with_column("aux", vec![Some(1.0), Some(1.0), None, Some(1.0)])
            .unwrap();

        let cleaned = table.drop_undefined_in(&[TARGET_COLUMN, "x"]).unwrap();
        assert_eq!(cleaned.target().unwrap(), vec![2.0, 3.0, 4.0]);
        assert!(cleaned.has_undefined());
        assert!(table.drop_undefined_in(&["missing"]).is_err());
    }

    #[test]
    fn undefined_cells_surface_as_data_errors() {
        let table = ObservationTable::from_series(dates(2), TARGET_COLUMN, vec![1.0, 2.0])
            .unwrap()
            .with_column("x", vec![Some(1.0), None])
            .unwrap();
        assert!(matches!(table.column("x"), Err(ForecastError::DataError(_))));
        assert!(matches!(table.column("nope"), Err(ForecastError::DataError(_))));
    }

    #[test]
    fn unsorted_index_is_rejected() {
        let mut index = dates(3);
        index.swap(0, 2);
        assert!(ObservationTable::from_series(index, TARGET_COLUMN, vec![0.0; 3]).is_err());
    }

    #[test]
    fn accepted_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2016, 2, 29).unwrap();
        assert_eq!(parse_date("2016-02-29").unwrap(), expected);
        assert_eq!(parse_date("29/02/2016").unwrap(), expected);
        assert_eq!(parse_date("2016-02-29 00:00:00").unwrap(), expected);
        assert!(parse_date("yesterday").is_err());
    }
}
