use chrono::{Duration, NaiveDate};
use precip_forecast::data::{ObservationTable, TARGET_COLUMN};
use precip_forecast::split::{chronological_split, split_slice, DEFAULT_TRAIN_FRACTION};
use precip_forecast::ForecastError;
use pretty_assertions::assert_eq;

#[test]
fn test_chronological_split_keeps_order() {
    let start = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
    let dates: Vec<NaiveDate> = (0..10).map(|i| start + Duration::days(i)).collect();
    let values: Vec<f64> = (0..10).map(f64::from).collect();
    let table = ObservationTable::from_series(dates.clone(), TARGET_COLUMN, values).unwrap();

    let (train, test) = chronological_split(&table, DEFAULT_TRAIN_FRACTION).unwrap();

    assert_eq!(train.len(), 8);
    assert_eq!(test.len(), 2);
    assert_eq!(train.dates().unwrap(), dates[..8].to_vec());
    assert_eq!(test.target().unwrap(), vec![8.0, 9.0]);
    // every training date precedes every test date
    assert!(train.dates().unwrap().last() < test.dates().unwrap().first());
}

#[test]
fn test_split_slice() {
    let (train, test) = split_slice(&[1, 2, 3, 4, 5], 0.6).unwrap();
    assert_eq!(train, vec![1, 2, 3]);
    assert_eq!(test, vec![4, 5]);
}

#[test]
fn test_degenerate_splits() {
    assert!(matches!(
        split_slice(&[1, 2, 3], 1.0),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(matches!(
        split_slice(&[1], 0.8),
        Err(ForecastError::DataError(_))
    ));
}
