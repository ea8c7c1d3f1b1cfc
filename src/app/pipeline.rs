//! Shared "fit pipeline" logic used by the subcommands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load files -> collection -> chronological sort -> evaluate -> batch trend
//!
//! The subcommands can then focus on presentation and export.

use std::path::{Path, PathBuf};

use log::info;

use crate::batch::{BatchAggregator, BatchFailure, BatchResults};
use crate::collection::{MeasurementCollection, SortOutcome};
use crate::domain::{DetectorConfig, FitConfig};
use crate::error::{AppError, EXIT_IO, FitError};
use crate::io::{ResultRecord, load_collection};
use crate::measurement::Measurement;

/// All computed outputs of a single `spectemp fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub collection: MeasurementCollection,
    pub sort: SortOutcome,
    pub records: Vec<ResultRecord>,
    pub failures: Vec<(String, FitError)>,
    pub batch: BatchResults,
    pub batch_failures: Vec<BatchFailure>,
}

/// Environment/`.env` detector settings, with an optional CLI override on top.
pub fn resolve_detector(ceiling_override: Option<f64>) -> Result<DetectorConfig, AppError> {
    let mut detector = DetectorConfig::from_env()?;
    if let Some(ceiling) = ceiling_override {
        detector.saturation_ceiling = ceiling;
    }
    Ok(detector)
}

/// Execute the full fitting pipeline over `inputs`.
pub fn run_fit(inputs: &[PathBuf], config: &FitConfig, detector: &DetectorConfig) -> Result<RunOutput, AppError> {
    let mut collection = load_collection(inputs, detector)?;
    let sort = collection.sort_chronologically();

    let failures = collection.evaluate_all(config);
    info!(
        "Evaluated {} spectra, {} failed",
        collection.flatten().len(),
        failures.len()
    );

    let records = collection
        .flatten()
        .into_iter()
        .map(|(_, m)| ResultRecord::from_measurement(m))
        .collect();

    let mut aggregator = BatchAggregator::from_collection(&collection);
    let batch = aggregator.extract(&collection).clone();
    let batch_failures = aggregator.failures().to_vec();

    Ok(RunOutput {
        collection,
        sort,
        records,
        failures,
        batch,
        batch_failures,
    })
}

/// Load one file and pick a leaf: by name, or the only one present.
pub fn load_single(path: &Path, name: Option<&str>, detector: &DetectorConfig) -> Result<Measurement, AppError> {
    let collection = load_collection(&[path], detector)?;
    let leaves = collection.flatten();

    let found = match name {
        Some(name) => leaves.iter().find(|(n, _)| *n == name).map(|(_, m)| *m),
        None if leaves.len() == 1 => leaves.first().map(|(_, m)| *m),
        None => {
            let names: Vec<&str> = leaves.iter().map(|(n, _)| *n).collect();
            return Err(AppError::new(
                EXIT_IO,
                format!("'{}' holds several spectra; pick one with --measurement ({})", path.display(), names.join(", ")),
            ));
        }
    };

    found.cloned().ok_or_else(|| {
        AppError::new(
            EXIT_IO,
            format!("No measurement '{}' in '{}'.", name.unwrap_or_default(), path.display()),
        )
    })
}
