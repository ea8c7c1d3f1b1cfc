//! One spectrum and the state of its three temperature estimators.
//!
//! A `Measurement` owns its samples exclusively. Fit results change only
//! through the fit operations below, and `evaluate_all` is the single place
//! that decides whether a configuration change requires re-fitting:
//!
//! ```text
//! evaluate_all(cfg)
//!   cfg == applied && evaluated  -> cached outcome (no solver call)
//!   otherwise                    -> apply_configuration(cfg)
//!                                   run FitStage::plan(cfg.use_background)
//!                                   on a scratch state; commit on success
//! ```
//!
//! A failed evaluation leaves the previously committed results readable.

use std::ops::Range;

use chrono::{DateTime, FixedOffset};
use log::{debug, warn};

use crate::domain::{DetectorConfig, FitConfig, RawSpectrum};
use crate::error::FitError;
use crate::fit::{
    FitStage, InitialGuess, LinearFit, NonlinearFit, RatioEstimate, delta_scan, estimate_ratio,
    fit_linear, fit_nonlinear,
};
use crate::models::linearize;

pub mod spectrum;

pub use spectrum::Spectrum;

/// Fit status as seen by batch consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// Never evaluated, configuration changed since, or the last evaluation failed.
    Unfitted,
    /// The last `evaluate_all` for the applied configuration succeeded.
    Fitted,
}

/// What `evaluate_all` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Refitted,
    Cached,
}

/// Results of the estimators over one window.
#[derive(Debug, Clone, Default)]
struct FitState {
    /// Configuration these results were computed with.
    config: Option<FitConfig>,
    window: Range<usize>,
    linearized: Vec<f64>,
    background: f64,
    linear: Option<LinearFit>,
    linear_stale: bool,
    nonlinear: Option<NonlinearFit>,
    ratio: Option<RatioEstimate>,
}

impl FitState {
    fn fresh(raw_linearized: &[f64], window: Range<usize>) -> Self {
        Self {
            window,
            linearized: raw_linearized.to_vec(),
            ..Self::default()
        }
    }

    fn run_linear(&mut self, spectrum: &Spectrum) -> Result<(), FitError> {
        let w = self.window.clone();
        let fit = fit_linear(&spectrum.wavelengths()[w.clone()], &self.linearized[w])?;
        debug!(
            "{}: linear fit T={:.1} K over {} points",
            spectrum.name(),
            fit.temperature,
            fit.points_used
        );
        self.linear = Some(fit);
        self.linear_stale = false;
        Ok(())
    }

    fn run_nonlinear(
        &mut self,
        spectrum: &Spectrum,
        raw_linearized: &[f64],
        use_background: bool,
    ) -> Result<(), FitError> {
        let guess = InitialGuess::from_estimates(
            self.linear.as_ref().map(|l| l.temperature),
            self.linear.as_ref().map(|l| l.multiplier),
        );
        let w = self.window.clone();
        let fit = fit_nonlinear(
            &spectrum.wavelengths()[w.clone()],
            &spectrum.intensities()[w],
            guess,
            use_background,
        )?;

        let previous_background = self.background;
        self.background = fit.background;
        if use_background {
            self.linearized = linearize(spectrum.wavelengths(), spectrum.intensities(), fit.background);
            self.linear_stale = true;
        } else {
            self.linearized = raw_linearized.to_vec();
            if previous_background != 0.0 {
                self.linear_stale = true;
            }
        }
        self.nonlinear = Some(fit);
        Ok(())
    }

    fn run_ratio(&mut self, spectrum: &Spectrum, delta: usize) -> Result<(), FitError> {
        let w = self.window.clone();
        let est = estimate_ratio(&spectrum.wavelengths()[w.clone()], &self.linearized[w], delta)?;
        self.ratio = Some(est);
        Ok(())
    }
}

/// One spectrum plus its fit configuration and results.
#[derive(Debug, Clone)]
pub struct Measurement {
    spectrum: Spectrum,
    raw_linearized: Vec<f64>,
    config: Option<FitConfig>,
    window: Range<usize>,
    state: FitState,
    /// Outcome of the last `evaluate_all` for `config`; cleared when `config` changes.
    outcome: Option<Result<(), FitError>>,
    fitted_once: bool,
    saturated: bool,
    fit_runs: usize,
}

impl Measurement {
    pub fn new(spectrum: Spectrum) -> Self {
        let raw_linearized = linearize(spectrum.wavelengths(), spectrum.intensities(), 0.0);
        let saturated = spectrum.is_saturated();
        Self {
            spectrum,
            state: FitState::fresh(&raw_linearized, 0..0),
            raw_linearized,
            config: None,
            window: 0..0,
            outcome: None,
            fitted_once: false,
            saturated,
            fit_runs: 0,
        }
    }

    /// Validate/sort a loader record and wrap it.
    pub fn from_raw(
        name: impl Into<String>,
        raw: RawSpectrum,
        detector: &DetectorConfig,
    ) -> Result<Self, FitError> {
        Spectrum::from_raw(name, raw, detector).map(Self::new)
    }

    /// Store a copy of `config` and recompute the window.
    ///
    /// Does not fit. Re-applying an equal configuration is a no-op.
    pub fn apply_configuration(&mut self, config: &FitConfig) {
        if self.config.as_ref() == Some(config) {
            return;
        }
        self.config = Some(config.clone());
        self.window = self.spectrum.window(config.lower_bound, config.upper_bound);
        self.outcome = None;
    }

    /// Linear fit over the current window and linearized transform.
    pub fn fit_linear(&mut self) -> Result<&LinearFit, FitError> {
        let mut staged = self.working_state()?;
        staged.run_linear(&self.spectrum)?;
        self.commit_stage(staged);
        self.state.linear.as_ref().ok_or(FitError::NotConfigured)
    }

    /// Nonlinear fit seeded from the current linear fit.
    ///
    /// With a background term, the linearized transform is recomputed with the
    /// fitted background and the linear fit is marked stale.
    pub fn fit_nonlinear(&mut self) -> Result<&NonlinearFit, FitError> {
        let use_background = self.require_config()?.use_background;
        let mut staged = self.working_state()?;
        staged.run_nonlinear(&self.spectrum, &self.raw_linearized, use_background)?;
        self.commit_stage(staged);
        self.state.nonlinear.as_ref().ok_or(FitError::NotConfigured)
    }

    /// Two-colour estimate on the current (possibly background-corrected) transform.
    pub fn fit_ratio(&mut self) -> Result<&RatioEstimate, FitError> {
        let delta = self.require_config()?.delta;
        let mut staged = self.working_state()?;
        staged.run_ratio(&self.spectrum, delta)?;
        self.commit_stage(staged);
        self.state.ratio.as_ref().ok_or(FitError::NotConfigured)
    }

    /// Bring the results in line with `config`, fitting only if it changed.
    pub fn evaluate_all(&mut self, config: &FitConfig) -> Result<Evaluation, FitError> {
        if self.config.as_ref() == Some(config) {
            if let Some(outcome) = &self.outcome {
                return outcome.clone().map(|()| Evaluation::Cached);
            }
        }

        self.apply_configuration(config);
        self.fit_runs += 1;

        let mut staged = FitState::fresh(&self.raw_linearized, self.window.clone());
        let result = run_stages(&mut staged, &self.spectrum, &self.raw_linearized, config);

        match &result {
            Ok(()) => {
                staged.config = Some(config.clone());
                self.state = staged;
                self.fitted_once = true;
            }
            Err(e) => warn!("{}: fit failed: {e}", self.spectrum.name()),
        }
        self.outcome = Some(result.clone());
        result.map(|()| Evaluation::Refitted)
    }

    /// `(delta, std_dev)` of the two-colour temperatures for `delta` in `1..=max_delta`.
    pub fn delta_scan(&self, max_delta: usize) -> Result<Vec<(usize, f64)>, FitError> {
        self.require_config()?;
        let w = self.window.clone();
        let linearized = if self.state.window == w {
            &self.state.linearized[w.clone()]
        } else {
            &self.raw_linearized[w.clone()]
        };
        Ok(delta_scan(&self.spectrum.wavelengths()[w], linearized, max_delta))
    }

    fn require_config(&self) -> Result<&FitConfig, FitError> {
        self.config.as_ref().ok_or(FitError::NotConfigured)
    }

    /// Scratch copy of the results for a single-stage fit; starts over when
    /// the applied window differs from the one the results were computed on.
    fn working_state(&self) -> Result<FitState, FitError> {
        self.require_config()?;
        if self.state.window == self.window {
            Ok(self.state.clone())
        } else {
            Ok(FitState::fresh(&self.raw_linearized, self.window.clone()))
        }
    }

    fn commit_stage(&mut self, mut staged: FitState) {
        staged.config = self.config.clone();
        self.state = staged;
    }

    pub fn name(&self) -> &str {
        self.spectrum.name()
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    pub fn acquisition_time(&self) -> Option<DateTime<FixedOffset>> {
        self.spectrum.acquisition_time()
    }

    pub fn configuration(&self) -> Option<&FitConfig> {
        self.config.as_ref()
    }

    /// Configuration the stored results were computed with.
    ///
    /// Differs from `configuration()` after a failed evaluation, which keeps
    /// the previous results.
    pub fn results_configuration(&self) -> Option<&FitConfig> {
        self.state.config.as_ref()
    }

    /// Samples selected by the applied configuration.
    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    /// Window the stored results were computed over.
    pub fn results_window(&self) -> Range<usize> {
        self.state.window.clone()
    }

    /// Linearized transform without background correction.
    pub fn raw_linearized(&self) -> &[f64] {
        &self.raw_linearized
    }

    /// Linearized transform the stored results use (background-corrected if fitted so).
    pub fn linearized(&self) -> &[f64] {
        &self.state.linearized
    }

    pub fn status(&self) -> FitStatus {
        match self.outcome {
            Some(Ok(())) => FitStatus::Fitted,
            _ => FitStatus::Unfitted,
        }
    }

    /// True once any evaluation has succeeded, even if a later one failed.
    pub fn has_been_fitted(&self) -> bool {
        self.fitted_once
    }

    /// Error of the last evaluation for the applied configuration, if it failed.
    pub fn last_error(&self) -> Option<&FitError> {
        self.outcome.as_ref().and_then(|o| o.as_ref().err())
    }

    /// Number of times the fit pipeline has actually run.
    pub fn fit_runs(&self) -> usize {
        self.fit_runs
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn background(&self) -> f64 {
        self.state.background
    }

    pub fn linear(&self) -> Option<&LinearFit> {
        self.state.linear.as_ref()
    }

    /// True after a background fit changed the transform and before the linear refit.
    pub fn is_linear_stale(&self) -> bool {
        self.state.linear_stale
    }

    pub fn nonlinear(&self) -> Option<&NonlinearFit> {
        self.state.nonlinear.as_ref()
    }

    pub fn ratio(&self) -> Option<&RatioEstimate> {
        self.state.ratio.as_ref()
    }

    pub fn nonlinear_temperature(&self) -> Option<f64> {
        self.nonlinear().map(|f| f.temperature)
    }

    pub fn linear_temperature(&self) -> Option<f64> {
        self.linear().map(|f| f.temperature)
    }
}

fn run_stages(
    state: &mut FitState,
    spectrum: &Spectrum,
    raw_linearized: &[f64],
    config: &FitConfig,
) -> Result<(), FitError> {
    for stage in FitStage::plan(config.use_background) {
        debug!("{}: {stage:?}", spectrum.name());
        match stage {
            FitStage::NeedsLinearBootstrap | FitStage::NeedsLinearRefine => state.run_linear(spectrum)?,
            FitStage::NeedsNonlinear => {
                state.run_nonlinear(spectrum, raw_linearized, config.use_background)?
            }
            FitStage::NeedsRatio => state.run_ratio(spectrum, config.delta)?,
            FitStage::Done => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticSpectrum;

    fn blackbody(temperature: f64, background: f64) -> Measurement {
        let raw = SyntheticSpectrum {
            temperature,
            background,
            ..SyntheticSpectrum::default()
        }
        .generate()
        .unwrap();
        Measurement::from_raw("bb", raw, &DetectorConfig::default()).unwrap()
    }

    fn config(lower: f64, upper: f64, delta: usize, use_background: bool) -> FitConfig {
        FitConfig {
            lower_bound: lower,
            upper_bound: upper,
            delta,
            use_background,
        }
    }

    #[test]
    fn recovers_known_temperature() {
        let mut m = blackbody(2500.0, 0.0);
        let outcome = m.evaluate_all(&config(550.0, 900.0, 50, false)).unwrap();
        assert_eq!(outcome, Evaluation::Refitted);
        assert_eq!(m.status(), FitStatus::Fitted);

        let t_nl = m.nonlinear_temperature().unwrap();
        let t_lin = m.linear_temperature().unwrap();
        assert!((t_nl - 2500.0).abs() <= 5.0, "nonlinear T={t_nl}");
        assert!((t_lin - 2500.0).abs() <= 20.0, "linear T={t_lin}");
        assert!((t_nl - t_lin).abs() <= 20.0);

        let ratio = m.ratio().unwrap();
        assert_eq!(ratio.delta, 50);
        assert!((ratio.mean - 2500.0).abs() < 20.0, "ratio mean={}", ratio.mean);
        assert_eq!(m.background(), 0.0);
        assert!(!m.is_linear_stale());
    }

    #[test]
    fn unchanged_configuration_is_a_cache_hit() {
        let mut m = blackbody(2500.0, 0.0);
        let cfg = config(550.0, 900.0, 50, false);
        m.evaluate_all(&cfg).unwrap();
        let before = m.nonlinear().unwrap().clone();
        let residuals_ptr = m.nonlinear().unwrap().residuals.as_ptr();

        assert_eq!(m.evaluate_all(&cfg).unwrap(), Evaluation::Cached);
        assert_eq!(m.evaluate_all(&cfg.clone()).unwrap(), Evaluation::Cached);
        assert_eq!(m.fit_runs(), 1);
        assert_eq!(m.nonlinear().unwrap(), &before);
        assert_eq!(m.nonlinear().unwrap().residuals.as_ptr(), residuals_ptr);

        let mut changed = cfg.clone();
        changed.delta = 60;
        assert_eq!(m.evaluate_all(&changed).unwrap(), Evaluation::Refitted);
        assert_eq!(m.fit_runs(), 2);
        assert_eq!(m.ratio().unwrap().delta, 60);
    }

    #[test]
    fn stored_configuration_does_not_alias_the_caller() {
        let mut m = blackbody(2500.0, 0.0);
        let mut cfg = config(550.0, 900.0, 50, false);
        m.apply_configuration(&cfg);

        cfg.lower_bound = 700.0;
        cfg.use_background = true;
        assert_eq!(m.configuration().unwrap().lower_bound, 550.0);
        assert!(!m.configuration().unwrap().use_background);
    }

    #[test]
    fn inverted_window_is_a_degenerate_fit() {
        let mut m = blackbody(2500.0, 0.0);
        let cfg = config(900.0, 550.0, 50, false);
        let err = m.evaluate_all(&cfg).unwrap_err();
        assert_eq!(err, FitError::DegenerateFit { found: 0, needed: 2 });
        assert_eq!(m.status(), FitStatus::Unfitted);

        // Same configuration again replays the failure without refitting.
        assert_eq!(m.evaluate_all(&cfg).unwrap_err(), err);
        assert_eq!(m.fit_runs(), 1);
    }

    #[test]
    fn failure_keeps_previous_results() {
        let mut m = blackbody(2500.0, 0.0);
        m.evaluate_all(&config(550.0, 900.0, 50, false)).unwrap();
        let good = m.nonlinear_temperature().unwrap();

        // 11 samples in the window: linear/nonlinear succeed, delta=50 cannot.
        let err = m.evaluate_all(&config(600.0, 610.0, 50, false)).unwrap_err();
        assert_eq!(err, FitError::EmptyWindow { found: 11, delta: 50 });
        assert_eq!(m.status(), FitStatus::Unfitted);
        assert!(m.has_been_fitted());
        assert_eq!(m.last_error(), Some(&err));
        assert_eq!(m.nonlinear_temperature(), Some(good));
        assert_eq!(m.results_window().len(), 351);
    }

    #[test]
    fn results_remember_the_configuration_that_produced_them() {
        let mut m = blackbody(2500.0, 0.0);
        let good = config(550.0, 900.0, 50, false);
        m.evaluate_all(&good).unwrap();
        assert_eq!(m.results_configuration(), Some(&good));

        let narrow = config(600.0, 610.0, 50, false);
        assert!(m.evaluate_all(&narrow).is_err());
        assert_eq!(m.configuration(), Some(&narrow));
        assert_eq!(m.results_configuration(), Some(&good));
    }

    #[test]
    fn solver_failure_in_single_stage_keeps_prior_result() {
        // Blackbody below 800 nm, dark detector above.
        let mut raw = SyntheticSpectrum::default().generate().unwrap();
        for (l, y) in raw.wavelengths.iter().zip(raw.intensities.iter_mut()) {
            if *l >= 800.0 {
                *y = 0.0;
            }
        }
        let mut m = Measurement::from_raw("dark", raw, &DetectorConfig::default()).unwrap();

        m.apply_configuration(&config(550.0, 790.0, 50, false));
        let before = m.fit_nonlinear().unwrap().clone();

        m.apply_configuration(&config(800.0, 900.0, 50, false));
        let err = m.fit_nonlinear().unwrap_err();
        assert!(matches!(err, FitError::FitDidNotConverge(_)), "{err:?}");
        assert_eq!(m.nonlinear(), Some(&before));
        assert_eq!(m.results_window(), 50..291);
        assert_eq!(m.results_configuration().unwrap().upper_bound, 790.0);
    }

    #[test]
    fn background_pipeline_refines_linear_fit() {
        let mut m = blackbody(2500.0, 2.0e4);
        m.evaluate_all(&config(550.0, 900.0, 50, true)).unwrap();

        let bg = m.background();
        assert!((bg - 2.0e4).abs() < 0.1 * 2.0e4, "bg={bg}");
        assert!(!m.is_linear_stale());
        let t_lin = m.linear_temperature().unwrap();
        assert!((t_lin - 2500.0).abs() < 50.0, "corrected linear T={t_lin}");
        assert_ne!(m.linearized(), m.raw_linearized());
    }

    #[test]
    fn single_stages_follow_the_documented_dependencies() {
        let mut m = blackbody(2500.0, 2.0e4);
        assert_eq!(m.fit_linear().unwrap_err(), FitError::NotConfigured);

        m.apply_configuration(&config(550.0, 900.0, 50, true));
        m.fit_linear().unwrap();
        assert!(!m.is_linear_stale());
        m.fit_nonlinear().unwrap();
        assert!(m.is_linear_stale());
        m.fit_linear().unwrap();
        assert!(!m.is_linear_stale());
        m.fit_ratio().unwrap();
        assert!(m.ratio().is_some());
        // Single stages do not count as an evaluation.
        assert_eq!(m.status(), FitStatus::Unfitted);
    }

    #[test]
    fn nonlinear_without_linear_uses_default_guess() {
        let mut m = blackbody(2500.0, 0.0);
        m.apply_configuration(&config(550.0, 900.0, 50, false));
        let t = m.fit_nonlinear().unwrap().temperature;
        assert!((t - 2500.0).abs() < 5.0, "T={t}");
    }

    #[test]
    fn delta_scan_uses_applied_window() {
        let mut m = blackbody(2500.0, 0.0);
        assert!(m.delta_scan(10).is_err());
        m.apply_configuration(&config(550.0, 600.0, 5, false));
        let scan = m.delta_scan(300).unwrap();
        assert_eq!(scan.len(), 50);
    }
}
