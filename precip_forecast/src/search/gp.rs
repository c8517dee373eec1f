//! Gaussian process surrogate for the Bayesian optimizer

use crate::error::{ForecastError, Result};
use crate::linalg::{cholesky, cholesky_solve, solve_lower};
use ndarray::{Array1, Array2, ArrayView1};

/// Length scales tried when fitting, in unit-cube coordinates
const LENGTH_SCALES: [f64; 5] = [0.1, 0.2, 0.35, 0.5, 1.0];

/// Diagonal jitter, grown until the kernel matrix factors
const JITTERS: [f64; 4] = [1e-6, 1e-5, 1e-4, 1e-2];

fn matern52(a: ArrayView1<f64>, b: ArrayView1<f64>, length_scale: f64) -> f64 {
    let r = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
        / length_scale;
    let sqrt5_r = 5.0_f64.sqrt() * r;
    (1.0 + sqrt5_r + 5.0 * r * r / 3.0) * (-sqrt5_r).exp()
}

fn kernel_matrix(x: &Array2<f64>, length_scale: f64, jitter: f64) -> Array2<f64> {
    let n = x.nrows();
    let mut k = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let value = matern52(x.row(i), x.row(j), length_scale);
            k[[i, j]] = value;
            k[[j, i]] = value;
        }
        k[[i, i]] += jitter;
    }
    k
}

/// Matérn 5/2 process over unit-scaled inputs with standardised targets
#[derive(Debug, Clone)]
pub(crate) struct GaussianProcess {
    x: Array2<f64>,
    l: Array2<f64>,
    alpha: Array1<f64>,
    length_scale: f64,
    y_mean: f64,
    y_std: f64,
}

impl GaussianProcess {
    /// Fit with the length scale of highest marginal likelihood
    pub(crate) fn fit(x: Array2<f64>, y: &[f64]) -> Result<Self> {
        if x.nrows() != y.len() || y.is_empty() {
            return Err(ForecastError::ValidationError(format!(
                "Surrogate needs one target per point, got {} points and {} targets",
                x.nrows(),
                y.len()
            )));
        }

        let n = y.len() as f64;
        let y_mean = y.iter().sum::<f64>() / n;
        let variance = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n;
        let y_std = if variance > 0.0 { variance.sqrt() } else { 1.0 };
        let z = Array1::from_iter(y.iter().map(|v| (v - y_mean) / y_std));

        let mut best: Option<(f64, Self)> = None;
        for &length_scale in &LENGTH_SCALES {
            let Some(l) = JITTERS
                .iter()
                .find_map(|&jitter| cholesky(&kernel_matrix(&x, length_scale, jitter)).ok())
            else {
                continue;
            };
            let alpha = cholesky_solve(&l, &z);
            let log_likelihood = -0.5 * z.dot(&alpha) - l.diag().mapv(f64::ln).sum();
            if best.as_ref().map_or(true, |(ll, _)| log_likelihood > *ll) {
                best = Some((
                    log_likelihood,
                    Self {
                        x: x.clone(),
                        l,
                        alpha,
                        length_scale,
                        y_mean,
                        y_std,
                    },
                ));
            }
        }

        best.map(|(_, gp)| gp).ok_or_else(|| {
            ForecastError::FitError("Surrogate kernel matrix could not be factored".to_string())
        })
    }

    /// Posterior mean and standard deviation at `point`, on the target scale
    pub(crate) fn predict(&self, point: ArrayView1<f64>) -> (f64, f64) {
        let k_star = Array1::from_iter(
            self.x
                .rows()
                .into_iter()
                .map(|row| matern52(row, point, self.length_scale)),
        );
        let mean = k_star.dot(&self.alpha);
        let v = solve_lower(&self.l, &k_star);
        let variance = (1.0 - v.dot(&v)).max(0.0);
        (
            self.y_mean + self.y_std * mean,
            self.y_std * variance.sqrt(),
        )
    }
}
