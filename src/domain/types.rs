//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - read from input documents (raw spectra)
//! - compared cheaply (fit configuration equality drives re-fitting)
//! - exported next to the fitted quantities

use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, EXIT_IO};

/// Environment variable overriding the detector saturation ceiling.
pub const SATURATION_CEILING_ENV: &str = "SPECTEMP_SATURATION_CEILING";

/// Everything that determines whether a measurement's fit results are stale.
///
/// Two configurations are equal iff all four fields match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Lower edge of the wavelength window (nm, inclusive).
    pub lower_bound: f64,
    /// Upper edge of the wavelength window (nm, inclusive).
    pub upper_bound: f64,
    /// Pixel offset of the two-colour estimator (>= 1).
    pub delta: usize,
    /// Whether the nonlinear fit includes an additive background term.
    pub use_background: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            lower_bound: 550.0,
            upper_bound: 900.0,
            delta: 100,
            use_background: false,
        }
    }
}

/// Detector properties needed at ingest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Raw reading at or above which a sample counts as saturated.
    pub saturation_ceiling: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            saturation_ceiling: u16::MAX as f64,
        }
    }
}

impl DetectorConfig {
    /// Defaults, overridden by `SPECTEMP_SATURATION_CEILING` (also read from `.env`).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(SATURATION_CEILING_ENV) {
            config.saturation_ceiling = raw.trim().parse::<f64>().map_err(|e| {
                AppError::new(
                    EXIT_IO,
                    format!("Invalid {SATURATION_CEILING_ENV}='{raw}': {e}"),
                )
            })?;
        }
        Ok(config)
    }
}

/// Field separator of the tabular export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Delimiter {
    #[default]
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }
}

/// One spectrum as delivered by a loader, before sorting/validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpectrum {
    pub wavelengths: Vec<f64>,
    pub intensities: Vec<f64>,
    /// Raw detector readings, compared against the saturation ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation_readings: Option<Vec<f64>>,
    /// Acquisition time as text (RFC 3339 or `%Y-%m-%dT%H:%M:%S%.f%z`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition_time: Option<String>,
}

/// A loader result: a single spectrum, or a series sharing one acquisition
/// (e.g. a mesh scan) that fans out into a group of sibling measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPayload {
    Single(RawSpectrum),
    Series(Vec<RawSpectrum>),
}

/// Parse an acquisition timestamp; `None` (with a warning) when unparsable.
pub fn parse_acquisition_time(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parsed = DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%z"));
    match parsed {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("Unparsable acquisition time '{text}': {e}");
            None
        }
    }
}
