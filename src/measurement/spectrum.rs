//! Validated, wavelength-sorted spectrum sample set.

use chrono::{DateTime, FixedOffset};

use crate::domain::{DetectorConfig, RawSpectrum, parse_acquisition_time};
use crate::error::FitError;

/// One spectrum's raw samples, sorted ascending by wavelength.
///
/// Sorting happens exactly once, here; every derived array keeps this order.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    name: String,
    wavelengths: Vec<f64>,
    intensities: Vec<f64>,
    saturation_flags: Option<Vec<bool>>,
    acquisition_time: Option<DateTime<FixedOffset>>,
}

impl Spectrum {
    /// Validate and sort a loader record.
    ///
    /// Saturation flags are derived from the raw detector readings against
    /// `detector.saturation_ceiling`.
    pub fn from_raw(
        name: impl Into<String>,
        raw: RawSpectrum,
        detector: &DetectorConfig,
    ) -> Result<Self, FitError> {
        let name = name.into();
        let invalid = |reason: String| FitError::InvalidSpectrum {
            name: name.clone(),
            reason,
        };

        let n = raw.wavelengths.len();
        if n == 0 {
            return Err(invalid("no samples".to_string()));
        }
        if raw.intensities.len() != n {
            return Err(invalid(format!(
                "{n} wavelengths but {} intensities",
                raw.intensities.len()
            )));
        }
        if let Some(readings) = &raw.saturation_readings {
            if readings.len() != n {
                return Err(invalid(format!(
                    "{n} wavelengths but {} saturation readings",
                    readings.len()
                )));
            }
        }
        if let Some(bad) = raw.wavelengths.iter().find(|l| !(l.is_finite() && **l > 0.0)) {
            return Err(invalid(format!("wavelength {bad} is not a positive finite value")));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| raw.wavelengths[a].total_cmp(&raw.wavelengths[b]));

        let wavelengths: Vec<f64> = order.iter().map(|&i| raw.wavelengths[i]).collect();
        if let Some(pair) = wavelengths.windows(2).find(|w| w[0] >= w[1]) {
            return Err(invalid(format!("duplicate wavelength {}", pair[0])));
        }
        let intensities = order.iter().map(|&i| raw.intensities[i]).collect();
        let saturation_flags = raw.saturation_readings.map(|readings| {
            order
                .iter()
                .map(|&i| readings[i] >= detector.saturation_ceiling)
                .collect()
        });
        let acquisition_time = raw.acquisition_time.as_deref().and_then(parse_acquisition_time);

        Ok(Self {
            name,
            wavelengths,
            intensities,
            saturation_flags,
            acquisition_time,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn saturation_flags(&self) -> Option<&[bool]> {
        self.saturation_flags.as_deref()
    }

    pub fn acquisition_time(&self) -> Option<DateTime<FixedOffset>> {
        self.acquisition_time
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// True if any sample reached the detector ceiling.
    pub fn is_saturated(&self) -> bool {
        self.saturation_flags
            .as_ref()
            .is_some_and(|flags| flags.iter().any(|&f| f))
    }

    /// Index range of samples with `lower <= λ <= upper` (empty if `upper < lower`).
    pub fn window(&self, lower: f64, upper: f64) -> std::ops::Range<usize> {
        let start = self.wavelengths.partition_point(|&l| l < lower);
        let end = self.wavelengths.partition_point(|&l| l <= upper);
        start..end.max(start)
    }
}
