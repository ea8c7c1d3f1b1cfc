//! Synthetic blackbody spectra with optional Gaussian noise.
//!
//! Used by the `simulate` command and as test fixtures: the true temperature,
//! multiplier and background are known, so the estimators can be checked
//! against them.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::RawSpectrum;
use crate::error::{AppError, EXIT_IO};
use crate::models::radiance;

/// Largest number of samples a generated spectrum may have.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Parameters of a generated spectrum. Wavelengths run from `start` to `end`
/// (inclusive, nm) in steps of `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpectrum {
    pub temperature: f64,
    pub multiplier: f64,
    pub background: f64,
    /// Standard deviation of additive noise, in intensity units. `0` = noiseless.
    pub noise: f64,
    pub seed: u64,
    pub start: f64,
    pub end: f64,
    pub step: f64,
    pub acquisition_time: Option<String>,
}

impl Default for SyntheticSpectrum {
    fn default() -> Self {
        Self {
            temperature: 2500.0,
            multiplier: 1e-6,
            background: 0.0,
            noise: 0.0,
            seed: 42,
            start: 500.0,
            end: 900.0,
            step: 1.0,
            acquisition_time: None,
        }
    }
}

impl SyntheticSpectrum {
    pub fn wavelengths(&self) -> Result<Vec<f64>, AppError> {
        if !(self.start.is_finite() && self.end.is_finite() && self.start > 0.0 && self.end > self.start) {
            return Err(AppError::new(
                EXIT_IO,
                format!("Invalid wavelength range {}..{} nm.", self.start, self.end),
            ));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(AppError::new(EXIT_IO, format!("Invalid wavelength step {}.", self.step)));
        }
        let steps = ((self.end - self.start) / self.step + 1e-9).floor();
        if !(steps < MAX_SAMPLES as f64) {
            return Err(AppError::new(
                EXIT_IO,
                format!(
                    "{}..{} nm in steps of {} nm exceeds {MAX_SAMPLES} samples.",
                    self.start, self.end, self.step
                ),
            ));
        }
        let count = steps as usize + 1;
        Ok((0..count).map(|i| self.start + i as f64 * self.step).collect())
    }

    pub fn generate(&self) -> Result<RawSpectrum, AppError> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(AppError::new(
                EXIT_IO,
                format!("Temperature must be > 0 K, got {}.", self.temperature),
            ));
        }
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(AppError::new(EXIT_IO, "Multiplier must be > 0."));
        }

        let wavelengths = self.wavelengths()?;
        let mut intensities: Vec<f64> = wavelengths
            .iter()
            .map(|&l| radiance(l, self.multiplier, self.temperature, self.background))
            .collect();

        if self.noise > 0.0 {
            let mut rng = StdRng::seed_from_u64(self.seed);
            let normal = Normal::new(0.0, self.noise)
                .map_err(|e| AppError::new(EXIT_IO, format!("Noise distribution error: {e}")))?;
            for y in &mut intensities {
                *y += normal.sample(&mut rng);
            }
        }

        Ok(RawSpectrum {
            wavelengths,
            intensities,
            saturation_readings: None,
            acquisition_time: self.acquisition_time.clone(),
        })
    }
}
