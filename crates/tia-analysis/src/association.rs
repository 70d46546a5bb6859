//! Test-to-code attribution
//!
//! Every tagged record is analyzed on its own, never on the merged window,
//! so a test is only credited for code its own probes covered.

use crate::analyzer::{StructuralAnalyzer, UnitBytes};
use crate::bundle::{analyze_unit, ClassNode};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tia_types::{package_of, AssociatedTests, CoverageKey, ProbeRecord};

/// Coverage key → distinct tests that exercised the element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationMap {
    entries: BTreeMap<CoverageKey, Vec<String>>,
}

impl AssociationMap {
    /// Tests associated with an element
    #[inline]
    #[must_use]
    pub fn tests(&self, key: &CoverageKey) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of tests associated with an element, absent when none
    #[inline]
    #[must_use]
    pub fn count(&self, key: &CoverageKey) -> Option<usize> {
        self.entries.get(key).map(Vec::len)
    }

    /// Number of associated elements
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No associations
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&CoverageKey, &Vec<String>)> {
        self.entries.iter()
    }

    /// Associated-tests fragment
    #[must_use]
    pub fn to_associated_tests(&self) -> Vec<AssociatedTests> {
        self.entries
            .iter()
            .map(|(key, tests)| AssociatedTests {
                id: key.id.clone(),
                package_name: key.package_name.clone(),
                class_name: key.class_name.clone(),
                method_name: key.method_name.clone(),
                tests: tests.clone(),
            })
            .collect()
    }

    fn insert(&mut self, key: CoverageKey, test: String) {
        let tests = self.entries.entry(key).or_default();
        if !tests.contains(&test) {
            tests.push(test);
        }
    }
}

/// Builds an [`AssociationMap`] from probe records
#[derive(Debug, Clone, Copy)]
pub struct AssociationMapper<'a> {
    analyzer: &'a dyn StructuralAnalyzer,
    units: &'a UnitBytes,
}

impl<'a> AssociationMapper<'a> {
    /// Create mapper over a build's units
    #[inline]
    #[must_use]
    pub fn new(analyzer: &'a dyn StructuralAnalyzer, units: &'a UnitBytes) -> Self {
        Self { analyzer, units }
    }

    /// Associate every tagged record with the elements it covered
    ///
    /// Records are analyzed in parallel. Records for unknown units or with
    /// unusable unit bytes contribute nothing.
    #[must_use]
    pub fn map(&self, records: &[ProbeRecord]) -> AssociationMap {
        let pairs: Vec<Vec<(CoverageKey, String)>> = records
            .par_iter()
            .map(|record| self.covered_keys(record))
            .collect();

        let mut map = AssociationMap::default();
        for (key, test) in pairs.into_iter().flatten() {
            map.insert(key, test);
        }
        map
    }

    fn covered_keys(&self, record: &ProbeRecord) -> Vec<(CoverageKey, String)> {
        let Some(test) = record.test_name.as_ref() else {
            return Vec::new();
        };
        let Some(bytes) = self.units.get(&record.unit_name) else {
            tracing::debug!(unit = %record.unit_name, "record for unknown unit");
            return Vec::new();
        };

        let class = match analyze_unit(self.analyzer, &record.unit_name, bytes, Some(&record.probes)) {
            Ok(unit) => ClassNode::from_analysis(unit),
            Err(err) => {
                tracing::warn!(unit = %record.unit_name, error = %err, "skipping record");
                return Vec::new();
            }
        };
        if !class.is_covered() {
            return Vec::new();
        }

        let mut keys = vec![
            (CoverageKey::package(package_of(&class.name)), test.clone()),
            (CoverageKey::class(&class.name), test.clone()),
        ];
        keys.extend(
            class
                .methods
                .iter()
                .filter(|m| m.instructions.is_covered())
                .map(|m| (CoverageKey::method(&m.method), test.clone())),
        );
        keys
    }
}
