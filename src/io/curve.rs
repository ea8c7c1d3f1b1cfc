//! Fitted-curve JSON.
//!
//! The portable representation of one measurement's fit:
//! - configuration and window
//! - windowed samples with both model curves and residuals
//! - the two-colour temperature distribution
//!
//! Non-finite numbers are written as `null`.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::domain::FitConfig;
use crate::error::{AppError, EXIT_IO, FitError};
use crate::fit::{LinearFit, NonlinearFit, RatioEstimate};
use crate::measurement::Measurement;

#[derive(Debug, Clone, Serialize)]
pub struct CurveFile<'a> {
    pub tool: &'static str,
    pub name: &'a str,
    pub time: Option<String>,
    pub config: &'a FitConfig,
    pub wavelengths: &'a [f64],
    pub intensities: &'a [f64],
    /// Linearized transform used by the stored results, over the window.
    pub linearized: &'a [f64],
    pub background: f64,
    pub linear: &'a LinearFit,
    pub nonlinear: &'a NonlinearFit,
    pub ratio: &'a RatioEstimate,
}

impl<'a> CurveFile<'a> {
    pub fn from_measurement(m: &'a Measurement) -> Result<Self, FitError> {
        let incomplete = || FitError::IncompleteFit(m.name().to_string());
        let config = m.results_configuration().ok_or_else(incomplete)?;
        let w = m.results_window();
        Ok(Self {
            tool: "spectemp",
            name: m.name(),
            time: m.acquisition_time().map(|t| t.to_rfc3339()),
            config,
            wavelengths: &m.spectrum().wavelengths()[w.clone()],
            intensities: &m.spectrum().intensities()[w.clone()],
            linearized: &m.linearized()[w],
            background: m.background(),
            linear: m.linear().ok_or_else(incomplete)?,
            nonlinear: m.nonlinear().ok_or_else(incomplete)?,
            ratio: m.ratio().ok_or_else(incomplete)?,
        })
    }
}

pub fn write_curve_json(path: &Path, m: &Measurement) -> Result<(), AppError> {
    let curve = CurveFile::from_measurement(m)?;
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &curve)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticSpectrum;
    use crate::domain::DetectorConfig;

    #[test]
    fn curve_json_carries_window_and_fits() {
        let raw = SyntheticSpectrum::default().generate().unwrap();
        let mut m = Measurement::from_raw("bb", raw, &DetectorConfig::default()).unwrap();
        assert!(CurveFile::from_measurement(&m).is_err());

        let cfg = FitConfig {
            lower_bound: 600.0,
            upper_bound: 700.0,
            delta: 10,
            use_background: false,
        };
        m.evaluate_all(&cfg).unwrap();
        let value = serde_json::to_value(CurveFile::from_measurement(&m).unwrap()).unwrap();

        assert_eq!(value["name"], "bb");
        assert_eq!(value["config"]["delta"], 10);
        assert_eq!(value["wavelengths"].as_array().unwrap().len(), 101);
        assert_eq!(value["nonlinear"]["fitted"].as_array().unwrap().len(), 101);
        assert_eq!(value["ratio"]["temperatures"].as_array().unwrap().len(), 91);
    }

    #[test]
    fn curve_json_config_matches_the_window_it_describes() {
        let raw = SyntheticSpectrum::default().generate().unwrap();
        let mut m = Measurement::from_raw("bb", raw, &DetectorConfig::default()).unwrap();
        let good = FitConfig {
            lower_bound: 600.0,
            upper_bound: 700.0,
            delta: 10,
            use_background: false,
        };
        m.evaluate_all(&good).unwrap();
        let failing = FitConfig {
            delta: 500,
            ..good.clone()
        };
        assert!(m.evaluate_all(&failing).is_err());

        let curve = CurveFile::from_measurement(&m).unwrap();
        assert_eq!(curve.config, &good);
        assert_eq!(curve.wavelengths.len(), 101);
    }
}
