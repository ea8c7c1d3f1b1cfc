//! Tabular exports.
//!
//! - results table: one row per measurement, fixed column order (`RESULT_COLUMNS`)
//! - raw-data table: one row per sample of a single measurement
//!
//! Both are written with the `csv` crate so quoting/escaping is handled.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::Delimiter;
use crate::error::{AppError, EXIT_IO, FitError};
use crate::measurement::{FitStatus, Measurement};

/// Column order of the results table. This is a persisted contract.
pub const RESULT_COLUMNS: [&str; 15] = [
    "name",
    "time",
    "fitted",
    "nonlinear_temperature",
    "linear_temperature",
    "ratio_temperature_mean",
    "ratio_temperature_stddev",
    "nonlinear_multiplier",
    "linear_multiplier",
    "background",
    "lower_bound",
    "upper_bound",
    "delta",
    "use_background",
    "saturated",
];

pub const RAW_COLUMNS: [&str; 4] = ["wavelength", "radiance", "linearized_radiance", "ratio_temperature"];

/// One results-table row. Field order must match `RESULT_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub name: String,
    /// ISO-8601 acquisition time; empty when unknown.
    pub time: Option<String>,
    pub fitted: bool,
    pub nonlinear_temperature: f64,
    pub linear_temperature: f64,
    pub ratio_temperature_mean: f64,
    pub ratio_temperature_stddev: f64,
    pub nonlinear_multiplier: f64,
    pub linear_multiplier: f64,
    pub background: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub delta: Option<usize>,
    pub use_background: Option<bool>,
    pub saturated: bool,
}

impl ResultRecord {
    /// Snapshot of a measurement's committed results (NaN where not available).
    ///
    /// The configuration columns describe the fit that produced the numbers,
    /// not a later configuration whose evaluation failed.
    pub fn from_measurement(m: &Measurement) -> Self {
        let config = m.results_configuration();
        Self {
            name: m.name().to_string(),
            time: m.acquisition_time().map(|t| t.to_rfc3339()),
            fitted: m.status() == FitStatus::Fitted,
            nonlinear_temperature: m.nonlinear().map_or(f64::NAN, |f| f.temperature),
            linear_temperature: m.linear().map_or(f64::NAN, |f| f.temperature),
            ratio_temperature_mean: m.ratio().map_or(f64::NAN, |r| r.mean),
            ratio_temperature_stddev: m.ratio().map_or(f64::NAN, |r| r.std_dev),
            nonlinear_multiplier: m.nonlinear().map_or(f64::NAN, |f| f.multiplier),
            linear_multiplier: m.linear().map_or(f64::NAN, |f| f.multiplier),
            background: m.background(),
            lower_bound: config.map(|c| c.lower_bound),
            upper_bound: config.map(|c| c.upper_bound),
            delta: config.map(|c| c.delta),
            use_background: config.map(|c| c.use_background),
            saturated: m.is_saturated(),
        }
    }
}

/// One raw-data row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RawRow {
    pub wavelength: f64,
    pub radiance: f64,
    pub linearized_radiance: f64,
    pub ratio_temperature: f64,
}

/// Every sample of `m`, with the two-colour temperatures placed at the
/// first sample of each pair and NaN elsewhere.
pub fn raw_rows(m: &Measurement) -> Result<Vec<RawRow>, FitError> {
    let ratio = m
        .ratio()
        .ok_or_else(|| FitError::IncompleteFit(m.name().to_string()))?;
    let start = m.results_window().start;
    let spectrum = m.spectrum();

    Ok(spectrum
        .wavelengths()
        .iter()
        .zip(spectrum.intensities())
        .zip(m.raw_linearized())
        .enumerate()
        .map(|(i, ((&wavelength, &radiance), &linearized_radiance))| RawRow {
            wavelength,
            radiance,
            linearized_radiance,
            ratio_temperature: i
                .checked_sub(start)
                .and_then(|j| ratio.temperatures.get(j))
                .copied()
                .unwrap_or(f64::NAN),
        })
        .collect())
}

pub fn write_results<W: Write>(writer: W, records: &[ResultRecord], delimiter: Delimiter) -> Result<(), AppError> {
    write_table(writer, &RESULT_COLUMNS, records, delimiter.as_byte())
}

pub fn write_raw<W: Write>(writer: W, rows: &[RawRow]) -> Result<(), AppError> {
    write_table(writer, &RAW_COLUMNS, rows, b'\t')
}

/// Write the results table for `measurements` to a file.
pub fn write_results_file<'a>(
    path: &Path,
    measurements: impl IntoIterator<Item = &'a Measurement>,
    delimiter: Delimiter,
) -> Result<(), AppError> {
    let records: Vec<ResultRecord> = measurements.into_iter().map(ResultRecord::from_measurement).collect();
    write_results(create(path)?, &records, delimiter)
}

pub fn write_raw_file(path: &Path, m: &Measurement) -> Result<(), AppError> {
    let rows = raw_rows(m)?;
    write_raw(create(path)?, &rows)
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::new(EXIT_IO, format!("Failed to create '{}': {e}", path.display())))
}

fn write_table<W: Write, R: Serialize>(
    writer: W,
    header: &[&str],
    rows: &[R],
    delimiter: u8,
) -> Result<(), AppError> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(writer);

    out.write_record(header)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to write export header: {e}")))?;
    for row in rows {
        out.serialize(row)
            .map_err(|e| AppError::new(EXIT_IO, format!("Failed to write export row: {e}")))?;
    }
    out.flush()
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to flush export: {e}")))?;
    Ok(())
}
