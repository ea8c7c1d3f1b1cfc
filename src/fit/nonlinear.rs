//! Nonlinear (Planck) fit.
//!
//! Fit `radiance(λ; ε, T, bg)` to the raw intensities by bounded nonlinear
//! least squares:
//!
//! | parameter  | bounds       | internal parameter `p`, mapping            |
//! |------------|--------------|--------------------------------------------|
//! | multiplier | `[0, ∞)`     | `ε = exp(p)`                               |
//! | temperature| `[0, T_max]` | `T = T_max · (1 + sin p) / 2`              |
//! | background | `[0, ∞)`     | `bg = s · (sqrt(p² + 1) - 1)` (optional)   |
//!
//! The solver (Levenberg–Marquardt, `levenberg-marquardt` crate) works on the
//! unbounded internal parameters; the mappings keep every trial point inside
//! the bounds. Residuals and the Jacobian are divided by the data scale `s`
//! (largest |intensity| in the window) so the solver's tolerances are
//! independent of the detector's intensity units.

use std::cell::Cell;

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::debug;
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use serde::Serialize;

use crate::error::FitError;
use crate::models::{FIRST_RADIATION, NM_PER_M, SECOND_RADIATION, radiance};

/// Upper temperature bound of the fit (K).
pub const TEMPERATURE_MAX: f64 = 2.0e4;
/// Initial temperature when no usable linear estimate exists (K).
pub const DEFAULT_TEMPERATURE_GUESS: f64 = 2000.0;
/// Initial multiplier when no usable linear estimate exists.
pub const DEFAULT_MULTIPLIER_GUESS: f64 = 1e-6;

/// Internal background parameter at start; `bg ≈ 0.005·s`.
const BACKGROUND_SEED: f64 = 0.1;
/// Keep the sine mapping away from its stationary points.
const TEMPERATURE_EDGE: f64 = 1e-6;

/// Starting point for the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialGuess {
    pub temperature: f64,
    pub multiplier: f64,
}

impl InitialGuess {
    /// Use the given estimates where they are finite and positive, defaults otherwise.
    pub fn from_estimates(temperature: Option<f64>, multiplier: Option<f64>) -> Self {
        let temperature = temperature
            .filter(|t| t.is_finite() && *t > 0.0 && *t < TEMPERATURE_MAX)
            .unwrap_or(DEFAULT_TEMPERATURE_GUESS);
        let multiplier = multiplier
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(DEFAULT_MULTIPLIER_GUESS);
        Self {
            temperature,
            multiplier,
        }
    }
}

impl Default for InitialGuess {
    fn default() -> Self {
        Self::from_estimates(None, None)
    }
}

/// Result of the nonlinear fit over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NonlinearFit {
    pub temperature: f64,
    pub multiplier: f64,
    /// Fitted additive background; `0.0` when the background term is disabled.
    pub background: f64,
    /// Model evaluated at each windowed wavelength.
    pub fitted: Vec<f64>,
    /// `intensity - fitted` per windowed sample; NaN for non-finite intensities.
    pub residuals: Vec<f64>,
    /// Residual evaluations spent by the solver.
    pub evaluations: usize,
}

/// Fit the Planck model to `intensities` (already restricted to the window).
pub fn fit_nonlinear(
    wavelengths: &[f64],
    intensities: &[f64],
    guess: InitialGuess,
    use_background: bool,
) -> Result<NonlinearFit, FitError> {
    let (lams, ys): (Vec<f64>, Vec<f64>) = wavelengths
        .iter()
        .zip(intensities)
        .filter(|&(_, y)| y.is_finite())
        .map(|(&l, &y)| (l, y))
        .unzip();

    let n_params = if use_background { 3 } else { 2 };
    if lams.len() < n_params {
        return Err(FitError::DegenerateFit {
            found: lams.len(),
            needed: n_params,
        });
    }

    let scale = ys.iter().fold(0.0_f64, |acc, y| acc.max(y.abs()));
    if !(scale > 0.0) {
        return Err(FitError::FitDidNotConverge(
            "all intensities in the window are zero".to_string(),
        ));
    }

    let problem = PlanckProblem::new(&lams, &ys, scale, guess, use_background);
    let (problem, report) = LevenbergMarquardt::new()
        .with_ftol(1e-12)
        .with_xtol(1e-12)
        .with_patience(200)
        .minimize(problem);

    let accepted = report.termination.was_successful()
        || matches!(report.termination, TerminationReason::NoImprovementPossible(_));
    if !accepted {
        return Err(FitError::FitDidNotConverge(format!("{:?}", report.termination)));
    }

    let (multiplier, temperature, background) = problem.physical();
    if !(multiplier.is_finite() && temperature.is_finite() && background.is_finite()) {
        return Err(FitError::FitDidNotConverge(
            "solver returned non-finite parameters".to_string(),
        ));
    }

    let evaluations = problem.evaluations.get();
    debug!(
        "planck fit: T={temperature:.1} K, eps={multiplier:.4e}, bg={background:.4e} ({evaluations} evaluations, {:?})",
        report.termination
    );

    let fitted: Vec<f64> = wavelengths
        .iter()
        .map(|&lam| radiance(lam, multiplier, temperature, background))
        .collect();
    let residuals = intensities
        .iter()
        .zip(&fitted)
        .map(|(y, f)| if y.is_finite() { y - f } else { f64::NAN })
        .collect();

    Ok(NonlinearFit {
        temperature,
        multiplier,
        background,
        fitted,
        residuals,
        evaluations,
    })
}

/// Least-squares problem over the internal (unbounded) parameters.
struct PlanckProblem<'a> {
    wavelengths: &'a [f64],
    intensities: &'a [f64],
    scale: f64,
    use_background: bool,
    params: DVector<f64>,
    evaluations: Cell<usize>,
}

impl<'a> PlanckProblem<'a> {
    fn new(
        wavelengths: &'a [f64],
        intensities: &'a [f64],
        scale: f64,
        guess: InitialGuess,
        use_background: bool,
    ) -> Self {
        let t = guess
            .temperature
            .clamp(TEMPERATURE_MAX * TEMPERATURE_EDGE, TEMPERATURE_MAX * (1.0 - TEMPERATURE_EDGE));
        let mut p = vec![guess.multiplier.ln(), (2.0 * t / TEMPERATURE_MAX - 1.0).asin()];
        if use_background {
            p.push(BACKGROUND_SEED);
        }

        Self {
            wavelengths,
            intensities,
            scale,
            use_background,
            params: DVector::from_vec(p),
            evaluations: Cell::new(0),
        }
    }

    /// Map internal parameters to `(multiplier, temperature, background)`.
    fn physical(&self) -> (f64, f64, f64) {
        let m = self.params[0].exp();
        let t = TEMPERATURE_MAX * (1.0 + self.params[1].sin()) / 2.0;
        let bg = if self.use_background {
            let w = self.params[2];
            self.scale * ((w * w + 1.0).sqrt() - 1.0)
        } else {
            0.0
        };
        (m, t, bg)
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for PlanckProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, p: &DVector<f64>) {
        self.params.copy_from(p);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.evaluations.set(self.evaluations.get() + 1);
        let (m, t, bg) = self.physical();
        let r = DVector::from_iterator(
            self.wavelengths.len(),
            self.wavelengths
                .iter()
                .zip(self.intensities)
                .map(|(&lam, &y)| (radiance(lam, m, t, bg) - y) / self.scale),
        );
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let (m, t, _) = self.physical();
        let n_params = self.params.len();
        let dt_dp = TEMPERATURE_MAX * self.params[1].cos() / 2.0;

        let mut jac = DMatrix::zeros(self.wavelengths.len(), n_params);
        for (i, &lam_nm) in self.wavelengths.iter().enumerate() {
            let lam = lam_nm / NM_PER_M;
            let a = FIRST_RADIATION / lam.powi(5);
            let x = SECOND_RADIATION / (lam * t);
            let em1 = x.exp_m1();

            // d/dε and d/dT of ε·a/(e^x - 1); e^x/(e^x-1)² = 1/((e^x-1)(1-e^-x)).
            let (d_eps, d_t) = if x.is_finite() && em1.is_finite() {
                (a / em1, m * a * (x / t) / (em1 * -(-x).exp_m1()))
            } else {
                (0.0, 0.0)
            };

            jac[(i, 0)] = d_eps * m / self.scale;
            jac[(i, 1)] = d_t * dt_dp / self.scale;
            if self.use_background {
                let w = self.params[2];
                jac[(i, 2)] = w / (w * w + 1.0).sqrt();
            }
        }

        jac.iter().all(|v| v.is_finite()).then_some(jac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(t: f64, eps: f64, bg: f64) -> (Vec<f64>, Vec<f64>) {
        let lams: Vec<f64> = (0..=350).map(|i| 550.0 + i as f64).collect();
        let ys = lams.iter().map(|&l| radiance(l, eps, t, bg)).collect();
        (lams, ys)
    }

    #[test]
    fn recovers_noiseless_spectrum_without_background() {
        let (lams, ys) = synthetic(2500.0, 1e-6, 0.0);
        let guess = InitialGuess::from_estimates(Some(2480.0), Some(1.1e-6));

        let fit = fit_nonlinear(&lams, &ys, guess, false).unwrap();
        assert!((fit.temperature - 2500.0).abs() < 1.0, "T={}", fit.temperature);
        assert!((fit.multiplier / 1e-6 - 1.0).abs() < 1e-3, "eps={}", fit.multiplier);
        assert_eq!(fit.background, 0.0);
        assert_eq!(fit.fitted.len(), lams.len());
        assert!(fit.evaluations > 0);
    }

    #[test]
    fn recovers_from_default_guess() {
        let (lams, ys) = synthetic(3200.0, 2e-7, 0.0);
        let fit = fit_nonlinear(&lams, &ys, InitialGuess::default(), false).unwrap();
        assert!((fit.temperature - 3200.0).abs() < 5.0, "T={}", fit.temperature);
    }

    #[test]
    fn fits_background_term() {
        let (lams, ys) = synthetic(2500.0, 1e-6, 2.0e4);
        let guess = InitialGuess::from_estimates(Some(2300.0), Some(1e-6));

        let fit = fit_nonlinear(&lams, &ys, guess, true).unwrap();
        assert!((fit.temperature - 2500.0).abs() < 25.0, "T={}", fit.temperature);
        assert!((fit.background - 2.0e4).abs() < 0.1 * 2.0e4, "bg={}", fit.background);
    }

    #[test]
    fn too_few_points_is_degenerate() {
        let err = fit_nonlinear(&[600.0, 700.0], &[1.0, 2.0], InitialGuess::default(), true).unwrap_err();
        assert_eq!(err, FitError::DegenerateFit { found: 2, needed: 3 });
    }

    #[test]
    fn all_zero_window_does_not_converge() {
        let lams: Vec<f64> = (0..=100).map(|i| 800.0 + i as f64).collect();
        let ys = vec![0.0; lams.len()];
        for use_background in [false, true] {
            let err = fit_nonlinear(&lams, &ys, InitialGuess::default(), use_background).unwrap_err();
            assert!(matches!(err, FitError::FitDidNotConverge(_)), "{err:?}");
        }
    }

    #[test]
    fn initial_guess_falls_back_on_non_finite_estimates() {
        let g = InitialGuess::from_estimates(Some(f64::NAN), Some(-1.0));
        assert_eq!(g.temperature, DEFAULT_TEMPERATURE_GUESS);
        assert_eq!(g.multiplier, DEFAULT_MULTIPLIER_GUESS);
    }
}
