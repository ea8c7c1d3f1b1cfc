//! Linearized (Wien) fit.
//!
//! Regress the linearized values `L` on `x = 1/λ[nm]` by ordinary least squares.
//! With `L ≈ 1e9·x/T - ln(ε)/c2`:
//!
//! - `T = 1e9 / slope`
//! - `ε = exp(-intercept · c2)`
//!
//! NaN samples (intensity at or below the background) are excluded from the
//! regression but keep their slot in the fitted/residual arrays.

use serde::Serialize;

use crate::error::FitError;
use crate::math::fit_line;
use crate::models::{NM_PER_M, SECOND_RADIATION};

/// Minimum number of finite samples for a straight-line fit.
const MIN_POINTS: usize = 2;

/// Result of the linearized fit over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearFit {
    pub temperature: f64,
    pub multiplier: f64,
    pub slope: f64,
    pub intercept: f64,
    /// Fitted line evaluated at each windowed wavelength.
    pub fitted: Vec<f64>,
    /// `L - fitted` per windowed sample; NaN where `L` is NaN.
    pub residuals: Vec<f64>,
    /// Number of finite samples that entered the regression.
    pub points_used: usize,
}

/// Fit `linearized` against `1/wavelengths` (both already restricted to the window).
pub fn fit_linear(wavelengths: &[f64], linearized: &[f64]) -> Result<LinearFit, FitError> {
    let (x, y): (Vec<f64>, Vec<f64>) = wavelengths
        .iter()
        .zip(linearized)
        .filter(|&(_, l)| l.is_finite())
        .map(|(&lam, &l)| (1.0 / lam, l))
        .unzip();

    if x.len() < MIN_POINTS {
        return Err(FitError::DegenerateFit {
            found: x.len(),
            needed: MIN_POINTS,
        });
    }

    let (slope, intercept) = fit_line(&x, &y).ok_or(FitError::DegenerateFit {
        found: x.len(),
        needed: MIN_POINTS,
    })?;

    let fitted: Vec<f64> = wavelengths.iter().map(|&lam| slope / lam + intercept).collect();
    let residuals = linearized.iter().zip(&fitted).map(|(l, f)| l - f).collect();

    Ok(LinearFit {
        temperature: NM_PER_M / slope,
        multiplier: (-intercept * SECOND_RADIATION).exp(),
        slope,
        intercept,
        fitted,
        residuals,
        points_used: x.len(),
    })
}
