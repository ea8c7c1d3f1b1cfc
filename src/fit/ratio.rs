//! Sliding two-colour (ratio) estimator.

use serde::Serialize;

use crate::error::FitError;
use crate::math::{nan_mean, nan_std};
use crate::models::ratio_temperature;

/// Distribution of two-colour temperatures over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioEstimate {
    pub delta: usize,
    /// One temperature per pair `(i, i + delta)`; length `window - delta`.
    pub temperatures: Vec<f64>,
    pub mean: f64,
    pub std_dev: f64,
}

/// Two-colour temperatures over a window, reduced to NaN-ignoring mean/std.
pub fn estimate_ratio(
    wavelengths: &[f64],
    linearized: &[f64],
    delta: usize,
) -> Result<RatioEstimate, FitError> {
    if wavelengths.len() < delta + 1 {
        return Err(FitError::EmptyWindow {
            found: wavelengths.len(),
            delta,
        });
    }

    let temperatures = ratio_temperature(wavelengths, linearized, delta)?;
    Ok(RatioEstimate {
        delta,
        mean: nan_mean(&temperatures),
        std_dev: nan_std(&temperatures),
        temperatures,
    })
}

/// Spread of the two-colour temperatures for every `delta` in `1..=max_delta`
/// that fits in the window, as `(delta, std_dev)` pairs.
pub fn delta_scan(wavelengths: &[f64], linearized: &[f64], max_delta: usize) -> Vec<(usize, f64)> {
    let limit = max_delta.min(wavelengths.len().saturating_sub(1));
    (1..=limit)
        .filter_map(|delta| {
            ratio_temperature(wavelengths, linearized, delta)
                .ok()
                .map(|t| (delta, nan_std(&t)))
        })
        .collect()
}
