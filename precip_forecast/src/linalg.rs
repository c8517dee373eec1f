//! Small dense solvers shared by the regression start of SARIMA and the
//! Gaussian process surrogate

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};

/// Lower Cholesky factor of a symmetric positive definite matrix
pub(crate) fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(ForecastError::ValidationError(format!(
            "Cholesky needs a square matrix, got {}x{}",
            n,
            a.ncols()
        )));
    }

    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let pivot = a[[i, i]] - sum;
                if !(pivot > 0.0) || !pivot.is_finite() {
                    return Err(ForecastError::FitError(format!(
                        "Matrix is not positive definite (pivot {} at row {})",
                        pivot, i
                    )));
                }
                l[[i, i]] = pivot.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Solve `L x = b` for lower triangular `L`
pub(crate) fn solve_lower(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * x[j]).sum();
        x[i] = (b[i] - sum) / l[[i, i]];
    }
    x
}

/// Solve `Lᵀ x = b` for lower triangular `L`
pub(crate) fn solve_upper_transposed(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (b[i] - sum) / l[[i, i]];
    }
    x
}

/// Solve `A x = b` given the Cholesky factor of `A`
pub(crate) fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    solve_upper_transposed(l, &solve_lower(l, b))
}

/// Least-squares coefficients of `y` on the columns of `x`
///
/// A ridge of `1e-8 · mean(diag(XᵀX))` keeps collinear designs solvable.
pub(crate) fn least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
    if x.nrows() != y.len() {
        return Err(ForecastError::ValidationError(format!(
            "Design has {} rows but the response has {} values",
            x.nrows(),
            y.len()
        )));
    }
    let k = x.ncols();
    if k == 0 {
        return Ok(Array1::zeros(0));
    }

    let mut gram = x.t().dot(x);
    let scale = gram.diag().sum() / k as f64;
    let ridge = if scale > 0.0 { scale * 1e-8 } else { 1e-8 };
    for i in 0..k {
        gram[[i, i]] += ridge;
    }
    let rhs = x.t().dot(y);
    let l = cholesky(&gram)?;
    Ok(cholesky_solve(&l, &rhs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn solves_spd_system() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&cholesky(&a).unwrap(), &b);
        let back = a.dot(&x);
        assert_relative_eq!(back[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(back[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_indefinite_matrix() {
        assert!(cholesky(&array![[1.0, 2.0], [2.0, 1.0]]).is_err());
    }

    #[test]
    fn recovers_regression_coefficients() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];
        let beta = least_squares(&x, &y).unwrap();
        assert_relative_eq!(beta[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(beta[1], 2.0, epsilon = 1e-6);
    }
}
