//! Blackbody radiometry.
//!
//! Three primitives used by every estimator:
//!
//! - `radiance`: Planck's law scaled by an emissivity-like multiplier, plus an
//!   additive background. This is the nonlinear model function.
//! - `linearized`: the log transform under which the Wien approximation is
//!   linear in `1/λ`:
//!
//!   ```text
//!   L(λ) = (k / hc) · ln( 2πhc² / ((I - bg) · λ⁵) ) ≈ 1/(λT) - (k/hc)·ln(ε)
//!   ```
//!
//! - `ratio_temperature`: the sliding two-colour estimator built on `L`.
//!
//! All functions take wavelengths in nanometres and convert to metres
//! internally; temperatures are in kelvin.

use crate::error::FitError;

/// Planck constant (J·s).
pub const PLANCK: f64 = 6.626_070_15e-34;
/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// First radiation constant for spectral exitance, `2πhc²` (W·m²).
pub const FIRST_RADIATION: f64 = 2.0 * std::f64::consts::PI * PLANCK * SPEED_OF_LIGHT * SPEED_OF_LIGHT;
/// Second radiation constant, `hc/k` (m·K).
pub const SECOND_RADIATION: f64 = PLANCK * SPEED_OF_LIGHT / BOLTZMANN;

/// Nanometres per metre.
pub const NM_PER_M: f64 = 1e9;

/// Spectral radiance at `wavelength` (nm).
///
/// Only meaningful for `temperature > 0`; callers (the nonlinear fitter) keep
/// the temperature inside `(0, T_max]`.
pub fn radiance(wavelength: f64, multiplier: f64, temperature: f64, background: f64) -> f64 {
    let lam = wavelength / NM_PER_M;
    let x = SECOND_RADIATION / (lam * temperature);
    multiplier * FIRST_RADIATION / lam.powi(5) / x.exp_m1() + background
}

/// Linearized (Wien) value for one sample.
///
/// Returns NaN when `intensity - background <= 0`: a reading at or below the
/// assumed background carries no temperature information and is treated as
/// missing data downstream.
pub fn linearized(wavelength: f64, intensity: f64, background: f64) -> f64 {
    let corrected = intensity - background;
    if !(corrected > 0.0) {
        return f64::NAN;
    }
    let lam = wavelength / NM_PER_M;
    (FIRST_RADIATION / (corrected * lam.powi(5))).ln() / SECOND_RADIATION
}

/// Linearize a whole spectrum (same length and order as the inputs).
pub fn linearize(wavelengths: &[f64], intensities: &[f64], background: f64) -> Vec<f64> {
    wavelengths
        .iter()
        .zip(intensities)
        .map(|(&lam, &i)| linearized(lam, i, background))
        .collect()
}

/// Sliding two-colour temperatures for a pixel `offset`.
///
/// Entry `i` pairs samples `i` and `i + offset`:
///
/// ```text
/// T_i = 1e9 · (1/λ_i - 1/λ_{i+offset}) / (L_i - L_{i+offset})
/// ```
///
/// The output has `len - offset` entries; NaN inputs propagate as NaN.
pub fn ratio_temperature(
    wavelengths: &[f64],
    linearized_values: &[f64],
    offset: usize,
) -> Result<Vec<f64>, FitError> {
    let len = wavelengths.len().min(linearized_values.len());
    if offset == 0 || offset >= len {
        return Err(FitError::InvalidOffset { offset, len });
    }

    Ok((0..len - offset)
        .map(|i| {
            let j = i + offset;
            let num = 1.0 / wavelengths[i] - 1.0 / wavelengths[j];
            let den = linearized_values[i] - linearized_values[j];
            NM_PER_M * num / den
        })
        .collect())
}
