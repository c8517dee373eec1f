//! Differencing polynomials
//!
//! Ordinary and seasonal differencing are both expressed as a lag-operator
//! polynomial `Δ(B) = (1 - B)^d (1 - B^s)^D = Σ c_i B^i` with `c_0 = 1`.
//! Working with the expanded coefficients lets a forecast made on the
//! differenced scale be integrated back one step at a time.

use crate::{MathError, Result};

/// Multiply two lag polynomials given by their coefficients
pub fn polynomial_multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Coefficients of `(1 - B)^d (1 - B^period)^seasonal_d`
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Result<Vec<f64>> {
    if seasonal_d > 0 && period < 2 {
        return Err(MathError::InvalidInput(
            "Seasonal differencing needs a period of at least 2".to_string(),
        ));
    }

    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = polynomial_multiply(&poly, &[1.0, -1.0]);
    }
    if seasonal_d > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            poly = polynomial_multiply(&poly, &seasonal);
        }
    }
    Ok(poly)
}

/// Apply the differencing polynomial, dropping the first `poly.len() - 1` positions
pub fn apply_difference(series: &[f64], poly: &[f64]) -> Result<Vec<f64>> {
    let order = poly.len().saturating_sub(1);
    if series.len() <= order {
        return Err(MathError::InsufficientData(format!(
            "Differencing of order {} needs more than {} observations, have {}",
            order,
            order,
            series.len()
        )));
    }

    Ok((order..series.len())
        .map(|t| {
            poly.iter()
                .enumerate()
                .map(|(i, c)| c * series[t - i])
                .sum()
        })
        .collect())
}

/// Recover the next level from `history` (levels so far) and a differenced value
///
/// Solves `Σ c_i y_{t-i} = diff_value` for `y_t`.
pub fn integrate_next(history: &[f64], poly: &[f64], diff_value: f64) -> Result<f64> {
    let order = poly.len().saturating_sub(1);
    if history.len() < order {
        return Err(MathError::InsufficientData(format!(
            "Integration of order {} needs {} past levels, have {}",
            order,
            order,
            history.len()
        )));
    }

    let t = history.len();
    let carried: f64 = poly
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, c)| c * history[t - i])
        .sum();
    Ok(diff_value - carried)
}

/// Apply ordinary differencing `d` times
pub fn difference(series: &[f64], d: usize) -> Result<Vec<f64>> {
    apply_difference(series, &differencing_polynomial(d, 0, 1)?)
}

/// Apply seasonal differencing at lag `period`, `seasonal_d` times
pub fn seasonal_difference(series: &[f64], seasonal_d: usize, period: usize) -> Result<Vec<f64>> {
    apply_difference(series, &differencing_polynomial(0, seasonal_d, period)?)
}
