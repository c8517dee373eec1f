use precip_forecast::models::forest::RandomForestConfig;
use precip_forecast::models::sarima::{Sarima, SarimaOrder};
use precip_forecast::models::{FeatureFrame, FittedRegressor, Regressor};
use precip_forecast::search::random::RandomSearchConfig;
use precip_forecast::search::{
    k_fold, BayesianConfig, BayesianOptimizer, Bound, Evaluation, GridSearch, ParamGrid,
    RandomizedSearch, SarimaGrid,
};
use precip_forecast::ForecastError;
use pretty_assertions::assert_eq;

#[test]
fn test_k_fold_covers_every_row_once() {
    let folds = k_fold(11, 5).unwrap();
    assert_eq!(folds.len(), 5);

    let mut seen: Vec<usize> = folds.iter().flat_map(|(_, val)| val.clone()).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..11).collect::<Vec<_>>());

    assert_eq!(folds[0].1, vec![0, 1, 2]);
    assert_eq!(folds[4].1, vec![9, 10]);
    for (train, val) in &folds {
        assert_eq!(train.len() + val.len(), 11);
        assert!(val.iter().all(|i| !train.contains(i)));
    }
}

#[test]
fn test_grid_search_skips_orders_that_cannot_be_fit() {
    // 20 points: the large seasonal orders run out of observations
    let y: Vec<f64> = (0..20).map(|i| [1.0, 3.0, 2.0, 5.0, 0.0, 4.0, 2.5][i % 7]).collect();
    let (train, test) = y.split_at(16);
    let orders = vec![
        SarimaOrder::new(2, 1, 2).with_seasonal(1, 1, 1, 7),
        SarimaOrder::new(0, 0, 0).with_seasonal(0, 1, 0, 7),
    ];

    let best = GridSearch::new(orders)
        .unwrap()
        .run(|order| {
            Evaluation::from_result(
                Sarima::new(*order)
                    .and_then(|m| m.fit(&FeatureFrame::empty(train.len()), train))
                    .and_then(|f| f.predict(&FeatureFrame::empty(test.len())))
                    .and_then(|p| precip_forecast::metrics::mean_squared_error(test, &p))
                    .map(|mse| -mse),
            )
        })
        .unwrap();

    assert_eq!(best.params, SarimaOrder::new(0, 0, 0).with_seasonal(0, 1, 0, 7));
    assert!(best.score.abs() < 1e-9);
}

#[test]
fn test_search_with_only_failures_is_exhausted() {
    let result = GridSearch::new(SarimaGrid::default().orders())
        .unwrap()
        .run(|_| Evaluation::Failed("nope".to_string()));
    assert!(matches!(
        result,
        Err(ForecastError::SearchExhausted { attempted: 216 })
    ));
}

#[test]
fn test_bayesian_failures_use_the_penalty_and_are_skipped() {
    let optimizer = BayesianOptimizer::new(
        vec![Bound::new("x", -1.0, 1.0)],
        BayesianConfig {
            init_points: 6,
            n_iter: 6,
            n_candidates: 200,
            seed: 3,
            ..Default::default()
        },
    )
    .unwrap();

    let outcome = optimizer
        .maximize(|p| {
            if p[0] < 0.0 {
                Evaluation::Failed("negative".to_string())
            } else {
                Evaluation::Scored(-(p[0] - 0.5).powi(2))
            }
        })
        .unwrap();

    assert_eq!(outcome.history.len(), 12);
    assert!(outcome.best.params[0] >= 0.0);
    assert!(outcome.best.score > optimizer.config().failure_penalty);
    for trial in &outcome.history {
        assert_eq!(trial.point[0] < 0.0, trial.evaluation.score().is_none());
    }
}

#[test]
fn test_bayesian_search_is_seeded() {
    let optimizer = BayesianOptimizer::new(
        vec![Bound::new("a", 0.0, 3.0), Bound::new("b", 0.0, 2.0)],
        BayesianConfig {
            init_points: 3,
            n_iter: 3,
            n_candidates: 100,
            ..Default::default()
        },
    )
    .unwrap();
    let objective = |p: &[f64]| Evaluation::Scored(-(p[0] - 1.0).powi(2) - (p[1] - 1.5).powi(2));
    let first = optimizer.maximize(objective).unwrap();
    let second = optimizer.maximize(objective).unwrap();
    assert_eq!(first.history, second.history);
}

fn weekly_rows(n: usize) -> (FeatureFrame, Vec<f64>) {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| vec![(i % 7) as f64, ((i + 1) % 7) as f64])
        .collect();
    let y: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] + 0.5 * r[1]).collect();
    let frame = FeatureFrame::new(vec!["dow".to_string(), "next".to_string()], rows).unwrap();
    (frame, y)
}

#[test]
fn test_randomized_search_is_reproducible() {
    let config = RandomSearchConfig {
        grid: ParamGrid {
            n_estimators: vec![5, 10],
            max_depth: vec![Some(3), Some(6)],
            min_samples_split: vec![2, 4],
            min_samples_leaf: vec![1],
        },
        n_iter: 3,
        folds: 3,
        seed: 11,
        base: RandomForestConfig::default(),
    };
    let (x, y) = weekly_rows(60);
    let search = RandomizedSearch::new(config).unwrap();

    let first = search.run(&x, &y).unwrap();
    let second = search.run(&x, &y).unwrap();

    assert_eq!(first.evaluated.len(), 3);
    assert_eq!(first.best, second.best);
    assert!(first.best.score <= 0.0);
    assert_eq!(first.model.predict(&x).unwrap().len(), 60);
}
