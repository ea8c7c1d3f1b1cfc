//! Batch aggregation of already-fitted measurements.
//!
//! The aggregator only remembers names; `extract` re-reads the current fit
//! results every time, so re-fitted members are picked up without rebuilding.

use crate::collection::MeasurementCollection;
use crate::error::FitError;
use crate::measurement::FitStatus;

/// Parallel per-member arrays, in the order the aggregator was built with.
///
/// Members that are missing or unfitted contribute NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResults {
    pub names: Vec<String>,
    pub nonlinear_temperatures: Vec<f64>,
    pub linear_temperatures: Vec<f64>,
    pub ratio_std_devs: Vec<f64>,
}

impl BatchResults {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub name: String,
    pub error: FitError,
}

#[derive(Debug, Clone, Default)]
pub struct BatchAggregator {
    names: Vec<String>,
    results: BatchResults,
    failures: Vec<BatchFailure>,
}

impl BatchAggregator {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Every leaf of `collection`, in flattened order.
    pub fn from_collection(collection: &MeasurementCollection) -> Self {
        Self::new(collection.flatten().into_iter().map(|(n, _)| n))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Rebuild the result arrays from the members' current state.
    pub fn extract(&mut self, collection: &MeasurementCollection) -> &BatchResults {
        let mut results = BatchResults::default();
        let mut failures = Vec::new();

        for name in &self.names {
            let fitted = collection
                .find(name)
                .filter(|m| m.status() == FitStatus::Fitted);
            match fitted {
                Some(m) => {
                    results.nonlinear_temperatures.push(m.nonlinear_temperature().unwrap_or(f64::NAN));
                    results.linear_temperatures.push(m.linear_temperature().unwrap_or(f64::NAN));
                    results
                        .ratio_std_devs
                        .push(m.ratio().map_or(f64::NAN, |r| r.std_dev));
                }
                None => {
                    failures.push(BatchFailure {
                        name: name.clone(),
                        error: FitError::IncompleteFit(name.clone()),
                    });
                    results.nonlinear_temperatures.push(f64::NAN);
                    results.linear_temperatures.push(f64::NAN);
                    results.ratio_std_devs.push(f64::NAN);
                }
            }
            results.names.push(name.clone());
        }

        self.results = results;
        self.failures = failures;
        &self.results
    }

    pub fn results(&self) -> &BatchResults {
        &self.results
    }

    /// Members that were not fitted at the last `extract`.
    pub fn failures(&self) -> &[BatchFailure] {
        &self.failures
    }
}
