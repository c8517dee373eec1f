//! Seasonal ARIMA with exogenous regressors
//!
//! The model is a regression with SARIMA errors:
//!
//! ```text
//! y_t = x_tᵀβ + η_t,   φ(B)Φ(Bˢ) Δ(B) η_t = θ(B)Θ(Bˢ) ε_t
//! ```
//!
//! where `Δ(B) = (1 - B)^d (1 - Bˢ)^D`. Target and regressors are
//! differenced with the same polynomial, the regression coefficients start
//! from ordinary least squares and every coefficient is then estimated by
//! minimising the conditional sum of squared innovations with Nelder–Mead.
//! Stationarity and invertibility are not enforced.

use crate::error::{ForecastError, Result};
use crate::linalg::least_squares;
use crate::models::{check_training_data, FeatureFrame, FittedRegressor, Regressor};
use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::neldermead::NelderMead;
use ndarray::{Array1, Array2};
use precip_math::differencing::{apply_difference, differencing_polynomial, integrate_next, polynomial_multiply};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Cost reported for parameters whose residuals overflow
const LARGE_COST: f64 = 1e30;

/// Seasonal period of daily data with a weekly cycle
pub const WEEKLY_PERIOD: usize = 7;

/// Non-seasonal `(p, d, q)` and seasonal `(P, D, Q, s)` orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl SarimaOrder {
    /// Non-seasonal order with a weekly period and no seasonal terms
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: WEEKLY_PERIOD,
        }
    }

    /// Set the seasonal part of the order
    pub fn with_seasonal(mut self, seasonal_p: usize, seasonal_d: usize, seasonal_q: usize, period: usize) -> Self {
        self.seasonal_p = seasonal_p;
        self.seasonal_d = seasonal_d;
        self.seasonal_q = seasonal_q;
        self.period = period;
        self
    }

    /// Whether any seasonal term is present
    pub fn is_seasonal(&self) -> bool {
        self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_seasonal() && self.period < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "Seasonal terms need a period of at least 2, got {}",
                self.period
            )));
        }
        Ok(())
    }

    /// Highest lag of the expanded autoregressive polynomial
    pub fn ar_lags(&self) -> usize {
        self.p + self.seasonal_p * self.period
    }

    /// Highest lag of the expanded moving-average polynomial
    pub fn ma_lags(&self) -> usize {
        self.q + self.seasonal_q * self.period
    }

    /// Observations consumed by differencing
    pub fn differencing_lags(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    /// Number of free AR and MA coefficients
    pub fn arma_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }
}

impl fmt::Display for SarimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})x({}, {}, {}, {})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

/// Optimiser settings of the SARIMA fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaConfig {
    /// Nelder–Mead iteration cap
    pub max_iters: u64,
    /// Stop once the simplex costs have this standard deviation
    pub sd_tolerance: f64,
    /// Forecasts beyond this multiple of the largest training magnitude are failures
    pub explosion_factor: f64,
}

impl Default for SarimaConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            sd_tolerance: 1e-10,
            explosion_factor: 1e6,
        }
    }
}

/// SARIMA strategy for one order
#[derive(Debug, Clone)]
pub struct Sarima {
    order: SarimaOrder,
    config: SarimaConfig,
}

impl Sarima {
    /// Create a new SARIMA strategy
    pub fn new(order: SarimaOrder) -> Result<Self> {
        Self::with_config(order, SarimaConfig::default())
    }

    /// Create a new SARIMA strategy with explicit optimiser settings
    pub fn with_config(order: SarimaOrder, config: SarimaConfig) -> Result<Self> {
        order.validate()?;
        if config.max_iters == 0 || !(config.sd_tolerance >= 0.0) || !(config.explosion_factor > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "SARIMA optimiser settings must be positive".to_string(),
            ));
        }
        Ok(Self { order, config })
    }

    /// Get the order
    pub fn order(&self) -> &SarimaOrder {
        &self.order
    }
}

/// `1 - Σ φ_i Bⁱ` times `1 - Σ Φ_j B^{js}` as lag coefficients
fn ar_polynomial(phi: &[f64], seasonal_phi: &[f64], period: usize) -> Vec<f64> {
    let mut short = vec![1.0];
    short.extend(phi.iter().map(|c| -c));
    let mut seasonal = vec![0.0; seasonal_phi.len() * period + 1];
    seasonal[0] = 1.0;
    for (j, c) in seasonal_phi.iter().enumerate() {
        seasonal[(j + 1) * period] = -c;
    }
    polynomial_multiply(&short, &seasonal)
}

/// `1 + Σ θ_i Bⁱ` times `1 + Σ Θ_j B^{js}` as lag coefficients
fn ma_polynomial(theta: &[f64], seasonal_theta: &[f64], period: usize) -> Vec<f64> {
    let mut short = vec![1.0];
    short.extend_from_slice(theta);
    let mut seasonal = vec![0.0; seasonal_theta.len() * period + 1];
    seasonal[0] = 1.0;
    for (j, c) in seasonal_theta.iter().enumerate() {
        seasonal[(j + 1) * period] = *c;
    }
    polynomial_multiply(&short, &seasonal)
}

/// Innovations of `w` under AR polynomial `a` and MA polynomial `b`,
/// conditioning on zero innovations before the first full AR lag
fn innovations(w: &[f64], a: &[f64], b: &[f64]) -> Vec<f64> {
    let start = a.len().saturating_sub(1);
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let ar: f64 = a.iter().enumerate().map(|(i, c)| c * w[t - i]).sum();
        let ma: f64 = b
            .iter()
            .enumerate()
            .skip(1)
            .take_while(|(i, _)| *i <= t)
            .map(|(i, c)| c * e[t - i])
            .sum();
        e[t] = ar - ma;
    }
    e
}

/// Coefficient vector layout: `β`, `φ`, `Φ`, `θ`, `Θ`
#[derive(Debug, Clone)]
struct Coefficients {
    beta: Vec<f64>,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl Coefficients {
    fn unpack(param: &[f64], k: usize, order: &SarimaOrder) -> Self {
        let mut offset = 0;
        let mut take = |n: usize| {
            let part = param[offset..offset + n].to_vec();
            offset += n;
            part
        };
        let beta = take(k);
        let phi = take(order.p);
        let seasonal_phi = take(order.seasonal_p);
        let theta = take(order.q);
        let seasonal_theta = take(order.seasonal_q);
        Self {
            beta,
            ar: ar_polynomial(&phi, &seasonal_phi, order.period),
            ma: ma_polynomial(&theta, &seasonal_theta, order.period),
        }
    }
}

/// Regression residuals `Δy_t - Δx_tᵀβ`
fn regression_residuals(dy: &[f64], dx: &[Vec<f64>], beta: &[f64]) -> Vec<f64> {
    dy.iter()
        .zip(dx)
        .map(|(y, row)| y - row.iter().zip(beta).map(|(x, b)| x * b).sum::<f64>())
        .collect()
}

struct CssProblem {
    dy: Vec<f64>,
    dx: Vec<Vec<f64>>,
    order: SarimaOrder,
}

impl CssProblem {
    fn css(&self, param: &[f64]) -> f64 {
        let k = self.dx.first().map(Vec::len).unwrap_or(0);
        if param.len() != k + self.order.arma_params() || param.iter().any(|v| !v.is_finite()) {
            return LARGE_COST;
        }
        let coefs = Coefficients::unpack(param, k, &self.order);
        let w = regression_residuals(&self.dy, &self.dx, &coefs.beta);
        let e = innovations(&w, &coefs.ar, &coefs.ma);
        let start = coefs.ar.len() - 1;
        let css: f64 = e[start..].iter().map(|v| v * v).sum();
        if css.is_finite() && css < LARGE_COST {
            css
        } else {
            LARGE_COST
        }
    }
}

impl CostFunction for CssProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        Ok(self.css(param))
    }
}

/// Initial simplex around `init`: the point itself and one step along each axis
fn initial_simplex(init: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = vec![init.to_vec()];
    for i in 0..init.len() {
        let mut vertex = init.to_vec();
        let step = if init[i].abs() > 1e-3 { 0.1 * init[i].abs() } else { 0.1 };
        vertex[i] += step;
        simplex.push(vertex);
    }
    simplex
}

/// A fitted regression with SARIMA errors
#[derive(Debug, Clone)]
pub struct FittedSarima {
    order: SarimaOrder,
    config: SarimaConfig,
    columns: Vec<String>,
    coefficients: Vec<f64>,
    beta: Vec<f64>,
    ar: Vec<f64>,
    ma: Vec<f64>,
    differencing: Vec<f64>,
    y_levels: Vec<f64>,
    x_levels: Vec<Vec<f64>>,
    w: Vec<f64>,
    e: Vec<f64>,
    css: f64,
    n_effective: usize,
}

impl Regressor for Sarima {
    type Fitted = FittedSarima;

    fn name(&self) -> &str {
        "sarima"
    }

    fn fit(&self, x: &FeatureFrame, y: &[f64]) -> Result<FittedSarima> {
        check_training_data(x, y)?;
        let order = self.order;
        let k = x.width();

        let differencing = differencing_polynomial(order.d, order.seasonal_d, order.period)?;
        let dy = apply_difference(y, &differencing)
            .map_err(|e| ForecastError::FitError(format!("SARIMA{}: {}", order, e)))?;
        let dx_columns = (0..k)
            .map(|j| {
                let column: Vec<f64> = x.rows().iter().map(|row| row[j]).collect();
                apply_difference(&column, &differencing)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let dx: Vec<Vec<f64>> = (0..dy.len())
            .map(|t| dx_columns.iter().map(|col| col[t]).collect())
            .collect();

        // the forecast recursion reads back as far as the longest AR or MA lag
        let start = order.ar_lags().max(order.ma_lags());
        let n_params = k + order.arma_params();
        if dy.len() <= start + n_params {
            return Err(ForecastError::FitError(format!(
                "SARIMA{} with {} regressors needs more than {} differenced observations, have {}",
                order,
                k,
                start + n_params,
                dy.len()
            )));
        }

        let design = Array2::from_shape_fn((dy.len(), k), |(t, j)| dx[t][j]);
        let beta0 = least_squares(&design, &Array1::from(dy.clone()))
            .map_err(|e| ForecastError::FitError(format!("SARIMA{} regression start: {}", order, e)))?;

        let mut init = beta0.to_vec();
        init.extend(std::iter::repeat(0.0).take(order.arma_params()));

        let problem = CssProblem {
            dy: dy.clone(),
            dx: dx.clone(),
            order,
        };

        let (coefficients, css) = if order.arma_params() == 0 {
            // ordinary least squares already minimises the sum of squares
            let css = problem.css(&init);
            (init, css)
        } else {
            let solver = NelderMead::new(initial_simplex(&init))
                .with_sd_tolerance(self.config.sd_tolerance)
                .map_err(|e| ForecastError::FitError(format!("SARIMA{}: {}", order, e)))?;
            let result = Executor::new(problem, solver)
                .configure(|state| state.max_iters(self.config.max_iters))
                .run()
                .map_err(|e| ForecastError::FitError(format!("SARIMA{}: {}", order, e)))?;
            let best = result
                .state
                .get_best_param()
                .cloned()
                .ok_or_else(|| {
                    ForecastError::FitError(format!("SARIMA{}: optimiser returned no parameters", order))
                })?;
            let cost = result.state.get_best_cost();
            (best, cost)
        };

        if !css.is_finite() || css >= LARGE_COST {
            return Err(ForecastError::FitError(format!(
                "SARIMA{}: conditional sum of squares did not converge to a finite value",
                order
            )));
        }

        let coefs = Coefficients::unpack(&coefficients, k, &order);
        let w = regression_residuals(&dy, &dx, &coefs.beta);
        let e = innovations(&w, &coefs.ar, &coefs.ma);
        let n_effective = dy.len() - start;

        debug!(order = %order, css, n_effective, "fitted sarima");

        Ok(FittedSarima {
            order,
            config: self.config,
            columns: x.columns().to_vec(),
            coefficients,
            beta: coefs.beta,
            ar: coefs.ar,
            ma: coefs.ma,
            differencing,
            y_levels: y.to_vec(),
            x_levels: x.rows().to_vec(),
            w,
            e,
            css,
            n_effective,
        })
    }
}

impl FittedSarima {
    /// Get the order
    pub fn order(&self) -> &SarimaOrder {
        &self.order
    }

    /// Estimated coefficients in the order `β`, `φ`, `Φ`, `θ`, `Θ`
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Regression coefficients of the exogenous columns
    pub fn regression_coefficients(&self) -> &[f64] {
        &self.beta
    }

    /// Minimised conditional sum of squares
    pub fn css(&self) -> f64 {
        self.css
    }

    /// Innovation variance estimate
    pub fn sigma2(&self) -> f64 {
        self.css / self.n_effective as f64
    }

    /// Gaussian Akaike information criterion of the conditional fit
    pub fn aic(&self) -> f64 {
        let n = self.n_effective as f64;
        let k = self.coefficients.len() as f64 + 1.0;
        n * (2.0 * std::f64::consts::PI * self.sigma2()).ln() + n + 2.0 * k
    }

    /// Out-of-sample path for the periods right after training
    ///
    /// `exog` holds one row of regressors per future period. Future
    /// innovations are zero.
    pub fn forecast(&self, exog: &FeatureFrame) -> Result<Vec<f64>> {
        if exog.columns() != self.columns.as_slice() {
            return Err(ForecastError::ValidationError(format!(
                "SARIMA was fit on [{}] but asked to forecast from [{}]",
                self.columns.join(", "),
                exog.columns().join(", ")
            )));
        }

        let n = self.x_levels.len();
        let mut x_all = self.x_levels.clone();
        x_all.extend(exog.rows().iter().cloned());
        let mut y_levels = self.y_levels.clone();
        let mut w = self.w.clone();
        let mut e = self.e.clone();

        let bound = self.config.explosion_factor
            * self.y_levels.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
        let mut path = Vec::with_capacity(exog.len());

        for t in n..n + exog.len() {
            let dx: Vec<f64> = (0..self.columns.len())
                .map(|j| {
                    self.differencing
                        .iter()
                        .enumerate()
                        .map(|(i, c)| c * x_all[t - i][j])
                        .sum()
                })
                .collect();

            let s = w.len();
            let ar: f64 = self
                .ar
                .iter()
                .enumerate()
                .skip(1)
                .take_while(|(i, _)| *i <= s)
                .map(|(i, c)| c * w[s - i])
                .sum();
            let ma: f64 = self
                .ma
                .iter()
                .enumerate()
                .skip(1)
                .take_while(|(i, _)| *i <= s)
                .map(|(i, c)| c * e[s - i])
                .sum();
            let w_next = ma - ar;
            w.push(w_next);
            e.push(0.0);

            let dy = dx.iter().zip(&self.beta).map(|(x, b)| x * b).sum::<f64>() + w_next;
            let level = integrate_next(&y_levels, &self.differencing, dy)?;
            if !level.is_finite() || level.abs() > bound {
                return Err(ForecastError::FitError(format!(
                    "SARIMA{} forecast diverged at step {}",
                    self.order,
                    t - n + 1
                )));
            }
            y_levels.push(level);
            path.push(level);
        }
        Ok(path)
    }
}

impl FittedRegressor for FittedSarima {
    fn predict(&self, x: &FeatureFrame) -> Result<Vec<f64>> {
        self.forecast(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn order_display_and_lags() {
        let order = SarimaOrder::new(1, 1, 1).with_seasonal(1, 0, 1, 7);
        assert_eq!(order.to_string(), "(1, 1, 1)x(1, 0, 1, 7)");
        assert_eq!(order.ar_lags(), 8);
        assert_eq!(order.ma_lags(), 8);
        assert_eq!(order.differencing_lags(), 1);
    }

    #[test]
    fn seasonal_polynomials_expand() {
        // (1 - 0.5B)(1 - 0.2B²)
        let a = ar_polynomial(&[0.5], &[0.2], 2);
        assert_eq!(a.len(), 4);
        assert_relative_eq!(a[1], -0.5);
        assert_relative_eq!(a[2], -0.2);
        assert_relative_eq!(a[3], 0.1);
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut y = vec![0.0];
        for t in 1..400 {
            y.push(0.6 * y[t - 1] + noise.sample(&mut rng));
        }
        let fitted = Sarima::new(SarimaOrder::new(1, 0, 0))
            .unwrap()
            .fit(&FeatureFrame::empty(y.len()), &y)
            .unwrap();
        assert_relative_eq!(fitted.coefficients()[0], 0.6, epsilon = 0.1);
        assert!(fitted.sigma2() > 0.7 && fitted.sigma2() < 1.3);
    }

    #[test]
    fn seasonal_difference_forecasts_the_weekly_pattern() {
        let pattern = [0.0, 1.0, 4.0, 2.0, 0.5, 3.0, 1.5];
        let y: Vec<f64> = (0..70).map(|i| pattern[i % 7]).collect();
        let fitted = Sarima::new(SarimaOrder::new(0, 0, 0).with_seasonal(0, 1, 0, 7))
            .unwrap()
            .fit(&FeatureFrame::empty(y.len()), &y)
            .unwrap();
        let path = fitted.forecast(&FeatureFrame::empty(14)).unwrap();
        for (i, value) in path.iter().enumerate() {
            assert_relative_eq!(*value, pattern[(70 + i) % 7], epsilon = 1e-9);
        }
    }

    #[test]
    fn regression_on_exogenous_column() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![(i as f64 * 0.9).sin()]).collect();
        let y: Vec<f64> = rows.iter().map(|r| 3.0 * r[0]).collect();
        let x = FeatureFrame::new(vec!["driver".to_string()], rows).unwrap();
        let fitted = Sarima::new(SarimaOrder::new(0, 0, 0)).unwrap().fit(&x, &y).unwrap();
        assert_relative_eq!(fitted.regression_coefficients()[0], 3.0, epsilon = 1e-6);

        let future = FeatureFrame::new(vec!["driver".to_string()], vec![vec![0.5], vec![-1.0]]).unwrap();
        let path = fitted.predict(&future).unwrap();
        assert_relative_eq!(path[0], 1.5, epsilon = 1e-5);
        assert_relative_eq!(path[1], -3.0, epsilon = 1e-5);
    }

    #[test]
    fn too_few_observations_is_a_fit_error() {
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = Sarima::new(SarimaOrder::new(2, 1, 2).with_seasonal(1, 1, 1, 7))
            .unwrap()
            .fit(&FeatureFrame::empty(y.len()), &y);
        assert!(matches!(result, Err(ForecastError::FitError(_))));
    }

    #[test]
    fn seasonal_ma_needs_history_beyond_its_longest_lag() {
        // θ(B)Θ(B⁷) reaches back nine days
        let order = SarimaOrder::new(0, 0, 2).with_seasonal(0, 0, 1, 7);
        let y = vec![0.4, 1.1, 0.0, 2.3, 0.7, 0.0, 1.5, 0.9];
        let result = Sarima::new(order).unwrap().fit(&FeatureFrame::empty(y.len()), &y);
        assert!(matches!(result, Err(ForecastError::FitError(_))));
    }

    #[test]
    fn seasonal_ma_forecasts_once_history_covers_its_lags() {
        let mut rng = StdRng::seed_from_u64(11);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let y: Vec<f64> = (0..30).map(|_| noise.sample(&mut rng)).collect();
        let fitted = Sarima::new(SarimaOrder::new(0, 0, 2).with_seasonal(0, 0, 1, 7))
            .unwrap()
            .fit(&FeatureFrame::empty(y.len()), &y)
            .unwrap();
        let path = fitted.predict(&FeatureFrame::empty(12)).unwrap();
        assert_eq!(path.len(), 12);
        // past the longest MA lag the forecast decays to zero
        assert_relative_eq!(path[11], 0.0, epsilon = 1e-12);
    }
}
