//! Ordinary least squares.
//!
//! The linearized (Wien) estimator regresses `L` on `1/λ`, a straight-line fit
//! with two coefficients. We solve it through the same SVD path used for any
//! small dense least-squares problem:
//!
//! - SVD handles tall design matrices (many more rows than columns) directly.
//! - The abscissa is centred before solving. `1/λ` spans roughly
//!   `1e-3..2e-3 nm⁻¹`, so an uncentred design has one column of ones and one
//!   nearly-constant column; centring keeps the two singular values apart.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y = slope·x + intercept`.
///
/// Returns `None` for fewer than two points or when all `x` coincide.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }

    let x_mean = x[..n].iter().sum::<f64>() / n as f64;
    let spread = x[..n].iter().map(|v| (v - x_mean).abs()).fold(0.0, f64::max);
    if !(spread > 0.0) {
        return None;
    }

    // Scale the centred column to unit spread so the SVD tolerance is relative.
    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { (x[i] - x_mean) / spread });
    let rhs = DVector::from_row_slice(&y[..n]);

    let beta = solve_least_squares(&design, &rhs)?;
    let slope = beta[1] / spread;
    let intercept = beta[0] - slope * x_mean;

    if slope.is_finite() && intercept.is_finite() {
        Some((slope, intercept))
    } else {
        None
    }
}
