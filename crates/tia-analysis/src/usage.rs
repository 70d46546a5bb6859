//! Per-test usage and per-test-type summaries

use crate::analyzer::{StructuralAnalyzer, UnitBytes};
use crate::bundle::{BundleCoverage, Selection};
use crate::error::AnalysisError;
use crate::probes::ProbeIndex;
use std::collections::{BTreeMap, BTreeSet};
use tia_types::{ProbeRecord, TestType, TestTypeSummary, TestUsage};

/// What each named test touched
///
/// Each test is analyzed against its own records only, restricted to the
/// units those records touch.
///
/// # Errors
/// Returns `AnalysisError::MalformedUnit` if a touched unit is unusable
pub fn test_usages(
    analyzer: &dyn StructuralAnalyzer,
    units: &UnitBytes,
    records: &[ProbeRecord],
    timestamp: i64,
) -> Result<Vec<TestUsage>, AnalysisError> {
    let mut by_test: BTreeMap<&str, Vec<&ProbeRecord>> = BTreeMap::new();
    for record in records {
        if let Some(test) = record.test_name.as_deref() {
            by_test.entry(test).or_default().push(record);
        }
    }

    by_test
        .into_iter()
        .map(|(test, records)| {
            let test_type = records
                .first()
                .map_or(TestType::Undefined, |r| r.effective_test_type());
            let index = ProbeIndex::from_records(records);
            let bundle = BundleCoverage::analyze(analyzer, units, &index, Selection::TouchedUnits)?;
            #[allow(clippy::cast_possible_truncation)]
            let covered_count = bundle.method_counter().covered as usize;
            Ok(TestUsage {
                test_id: test.to_string(),
                covered_count,
                test_type,
                timestamp,
            })
        })
        .collect()
}

/// Coverage reached by each kind of test over the whole build
///
/// # Errors
/// Returns `AnalysisError::MalformedUnit` if a unit is unusable
pub fn test_type_summaries(
    analyzer: &dyn StructuralAnalyzer,
    units: &UnitBytes,
    records: &[ProbeRecord],
) -> Result<Vec<TestTypeSummary>, AnalysisError> {
    let mut by_type: BTreeMap<TestType, Vec<&ProbeRecord>> = BTreeMap::new();
    for record in records {
        by_type
            .entry(record.effective_test_type())
            .or_default()
            .push(record);
    }

    by_type
        .into_iter()
        .map(|(test_type, records)| {
            let tests: BTreeSet<_> = records.iter().filter_map(|r| r.test_name.as_deref()).collect();
            let index = ProbeIndex::from_records(records.iter().copied());
            let bundle = BundleCoverage::analyze(analyzer, units, &index, Selection::AllUnits)?;
            Ok(TestTypeSummary {
                test_type,
                coverage: bundle.ratio(),
                tests_count: tests.len(),
            })
        })
        .collect()
}
