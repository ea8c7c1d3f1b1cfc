//! Two-level, ordered collection of named measurements.
//!
//! A top-level entry is either a single measurement or a group of sibling
//! measurements that share one acquisition (a series/mesh scan). Top-level
//! names are unique, and so are leaf names across both levels, so `find` is
//! unambiguous. Groups do not nest.

use chrono::{DateTime, FixedOffset};
use log::{info, warn};

use crate::domain::{DetectorConfig, FitConfig, RawPayload};
use crate::error::FitError;
use crate::measurement::{Evaluation, Measurement};

/// Ordered name → measurement mapping for the members of one group.
#[derive(Debug, Clone, Default)]
pub struct MeasurementGroup {
    members: Vec<(String, Measurement)>,
}

impl MeasurementGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, measurement: Measurement) -> Result<(), FitError> {
        let name = name.into();
        if self.members.iter().any(|(n, _)| *n == name) {
            return Err(FitError::DuplicateName(name));
        }
        self.members.push((name, measurement));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Measurement)> {
        self.members.iter().map(|(n, m)| (n.as_str(), m))
    }

    /// Timestamp of the first member in insertion order.
    pub fn acquisition_time(&self) -> Option<DateTime<FixedOffset>> {
        self.members.first().and_then(|(_, m)| m.acquisition_time())
    }
}

#[derive(Debug, Clone)]
pub enum Entry {
    Leaf(Measurement),
    Group(MeasurementGroup),
}

impl Entry {
    fn leaf_names<'a>(&'a self, key: &'a str) -> Vec<&'a str> {
        match self {
            Entry::Leaf(_) => vec![key],
            Entry::Group(g) => g.iter().map(|(n, _)| n).collect(),
        }
    }

    fn acquisition_time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Entry::Leaf(m) => m.acquisition_time(),
            Entry::Group(g) => g.acquisition_time(),
        }
    }
}

/// Result of `sort_chronologically`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortOutcome {
    Chronological,
    /// Some entries had no usable timestamp; insertion order was kept.
    InsertionOrder { undated: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub struct MeasurementCollection {
    entries: Vec<(String, Entry)>,
}

impl MeasurementCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level entry. Fails if `name` is taken at the top level or
    /// if any of its leaf names already names a leaf in the collection.
    pub fn insert(&mut self, name: impl Into<String>, entry: Entry) -> Result<(), FitError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(FitError::DuplicateName(name));
        }
        let existing = self.flatten();
        if let Some(clash) = entry
            .leaf_names(&name)
            .into_iter()
            .find(|leaf| existing.iter().any(|(n, _)| n == leaf))
        {
            return Err(FitError::DuplicateName(clash.to_string()));
        }
        self.entries.push((name, entry));
        Ok(())
    }

    /// Turn a loader payload into a leaf or a group of `"{name}_{index}"` members.
    pub fn ingest(
        &mut self,
        name: &str,
        payload: RawPayload,
        detector: &DetectorConfig,
    ) -> Result<(), FitError> {
        if self.contains(name) {
            return Err(FitError::DuplicateName(name.to_string()));
        }
        let entry = match payload {
            RawPayload::Single(raw) => Entry::Leaf(Measurement::from_raw(name, raw, detector)?),
            RawPayload::Series(series) => {
                let mut group = MeasurementGroup::new();
                for (i, raw) in series.into_iter().enumerate() {
                    let member = format!("{name}_{i}");
                    let m = Measurement::from_raw(member.clone(), raw, detector)?;
                    group.insert(member, m)?;
                }
                info!("{name}: {} spectra in series", group.len());
                Entry::Group(group)
            }
        };
        self.insert(name, entry)
    }

    /// Remove a top-level entry (a measurement or a whole group).
    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level names in current order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    /// Stable sort by acquisition time. If any entry is undated the order is
    /// left unchanged and the undated names are reported.
    pub fn sort_chronologically(&mut self) -> SortOutcome {
        let undated: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.acquisition_time().is_none())
            .map(|(n, _)| n.clone())
            .collect();

        if !undated.is_empty() {
            warn!(
                "Cannot sort chronologically, no timestamp for: {}; keeping insertion order",
                undated.join(", ")
            );
            return SortOutcome::InsertionOrder { undated };
        }

        self.entries.sort_by_key(|(_, e)| e.acquisition_time());
        SortOutcome::Chronological
    }

    /// Leaf name → measurement, in collection order, groups expanded in place.
    pub fn flatten(&self) -> Vec<(&str, &Measurement)> {
        let mut out = Vec::new();
        for (name, entry) in &self.entries {
            match entry {
                Entry::Leaf(m) => out.push((name.as_str(), m)),
                Entry::Group(g) => out.extend(g.iter()),
            }
        }
        out
    }

    pub fn flatten_mut(&mut self) -> Vec<(&str, &mut Measurement)> {
        let mut out = Vec::new();
        for (name, entry) in &mut self.entries {
            match entry {
                Entry::Leaf(m) => out.push((name.as_str(), m)),
                Entry::Group(g) => out.extend(g.members.iter_mut().map(|(n, m)| (n.as_str(), m))),
            }
        }
        out
    }

    /// Look up a leaf by name; `None` when absent.
    pub fn find(&self, name: &str) -> Option<&Measurement> {
        self.flatten().into_iter().find(|(n, _)| *n == name).map(|(_, m)| m)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Measurement> {
        self.flatten_mut().into_iter().find(|(n, _)| *n == name).map(|(_, m)| m)
    }

    /// `evaluate_all` on one leaf; `None` when the name is unknown.
    pub fn evaluate(&mut self, name: &str, config: &FitConfig) -> Option<Result<Evaluation, FitError>> {
        self.find_mut(name).map(|m| m.evaluate_all(config))
    }

    /// `evaluate_all` on every leaf; failures are collected, not fatal.
    pub fn evaluate_all(&mut self, config: &FitConfig) -> Vec<(String, FitError)> {
        let mut failures = Vec::new();
        for (name, m) in self.flatten_mut() {
            if let Err(e) = m.evaluate_all(config) {
                failures.push((name.to_string(), e));
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticSpectrum;
    use crate::domain::RawSpectrum;

    fn raw_at(time: Option<&str>) -> RawSpectrum {
        SyntheticSpectrum {
            acquisition_time: time.map(str::to_string),
            ..SyntheticSpectrum::default()
        }
        .generate()
        .unwrap()
    }

    fn leaf(name: &str, time: Option<&str>) -> Entry {
        Entry::Leaf(Measurement::from_raw(name, raw_at(time), &DetectorConfig::default()).unwrap())
    }

    #[test]
    fn flatten_expands_groups_with_member_keys() {
        let mut c = MeasurementCollection::new();
        c.insert("single", leaf("single", None)).unwrap();
        c.ingest(
            "mesh",
            RawPayload::Series(vec![raw_at(None), raw_at(None)]),
            &DetectorConfig::default(),
        )
        .unwrap();

        let names: Vec<&str> = c.flatten().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["single", "mesh_0", "mesh_1"]);
        assert_eq!(c.find("mesh_1").unwrap().name(), "mesh_1");
        assert!(c.find("mesh").is_none());
        assert!(c.find("missing").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected_per_level() {
        let mut c = MeasurementCollection::new();
        c.insert("a", leaf("a", None)).unwrap();
        assert_eq!(
            c.insert("a", leaf("a", None)).unwrap_err(),
            FitError::DuplicateName("a".to_string())
        );
        let err = c
            .ingest("a", RawPayload::Single(raw_at(None)), &DetectorConfig::default())
            .unwrap_err();
        assert!(matches!(err, FitError::DuplicateName(_)));

        let mut g = MeasurementGroup::new();
        let m = Measurement::from_raw("x", raw_at(None), &DetectorConfig::default()).unwrap();
        g.insert("x", m.clone()).unwrap();
        assert!(g.insert("x", m).is_err());
    }

    #[test]
    fn leaf_names_are_unique_across_levels() {
        let mut c = MeasurementCollection::new();
        c.insert("mesh_0", leaf("mesh_0", None)).unwrap();
        let err = c
            .ingest(
                "mesh",
                RawPayload::Series(vec![raw_at(None), raw_at(None)]),
                &DetectorConfig::default(),
            )
            .unwrap_err();
        assert_eq!(err, FitError::DuplicateName("mesh_0".to_string()));
        assert_eq!(c.len(), 1);

        let mut c = MeasurementCollection::new();
        c.ingest(
            "scan",
            RawPayload::Series(vec![raw_at(None)]),
            &DetectorConfig::default(),
        )
        .unwrap();
        assert_eq!(
            c.insert("scan_0", leaf("scan_0", None)).unwrap_err(),
            FitError::DuplicateName("scan_0".to_string())
        );
        assert_eq!(c.flatten().len(), 1);
    }

    #[test]
    fn sorts_by_time_using_first_group_member() {
        let mut c = MeasurementCollection::new();
        c.insert("late", leaf("late", Some("2023-02-13T12:00:00+00:00"))).unwrap();
        c.ingest(
            "series",
            RawPayload::Series(vec![
                raw_at(Some("2023-02-13T11:00:00+00:00")),
                raw_at(Some("2023-02-13T13:00:00+00:00")),
            ]),
            &DetectorConfig::default(),
        )
        .unwrap();
        c.insert("early", leaf("early", Some("2023-02-13T10:00:00+00:00"))).unwrap();

        assert_eq!(c.sort_chronologically(), SortOutcome::Chronological);
        assert_eq!(c.names(), vec!["early", "series", "late"]);
    }

    #[test]
    fn undated_entries_fall_back_to_insertion_order() {
        let mut c = MeasurementCollection::new();
        c.insert("b", leaf("b", Some("2023-02-13T12:00:00+00:00"))).unwrap();
        c.insert("nodate", leaf("nodate", Some("not a time"))).unwrap();
        c.insert("a", leaf("a", Some("2023-02-13T10:00:00+00:00"))).unwrap();

        assert_eq!(
            c.sort_chronologically(),
            SortOutcome::InsertionOrder {
                undated: vec!["nodate".to_string()]
            }
        );
        assert_eq!(c.names(), vec!["b", "nodate", "a"]);
    }

    #[test]
    fn batch_evaluation_collects_failures() {
        let mut c = MeasurementCollection::new();
        c.insert("ok", leaf("ok", None)).unwrap();
        let narrow = RawSpectrum {
            wavelengths: vec![600.0, 601.0, 602.0],
            intensities: vec![1.0e5, 1.1e5, 1.2e5],
            saturation_readings: None,
            acquisition_time: None,
        };
        c.ingest("short", RawPayload::Single(narrow), &DetectorConfig::default())
            .unwrap();

        let cfg = FitConfig {
            delta: 50,
            ..FitConfig::default()
        };
        let failures = c.evaluate_all(&cfg);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "short");
        assert!(c.find("ok").unwrap().nonlinear_temperature().is_some());

        assert_eq!(c.evaluate("ok", &cfg), Some(Ok(Evaluation::Cached)));
        assert!(c.evaluate("nope", &cfg).is_none());
    }

    #[test]
    fn remove_drops_whole_entry() {
        let mut c = MeasurementCollection::new();
        c.ingest(
            "mesh",
            RawPayload::Series(vec![raw_at(None), raw_at(None)]),
            &DetectorConfig::default(),
        )
        .unwrap();
        assert!(matches!(c.remove("mesh"), Some(Entry::Group(g)) if g.len() == 2));
        assert!(c.remove("mesh").is_none());
        assert!(c.flatten().is_empty());
    }
}
