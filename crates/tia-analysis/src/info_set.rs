//! Full result bundle of one coverage computation

use crate::aggregate::coverage_block;
use crate::analyzer::{StructuralAnalyzer, UnitBytes};
use crate::association::AssociationMapper;
use crate::bundle::{BundleCoverage, Selection};
use crate::diff::ClassDiffEngine;
use crate::error::AnalysisError;
use crate::probes::ProbeIndex;
use crate::tree::package_tree;
use crate::usage::{test_type_summaries, test_usages};
use tia_types::{
    AssociatedTests, CoverageBlock, Method, NewCoverageBlock, NewMethodCoverage, PackageCoverage,
    ProbeRecord, TestTypeSummary, TestUsage,
};

/// Every fragment produced by one computation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoverageInfoSet {
    /// Element → tests
    pub associated_tests: Vec<AssociatedTests>,
    /// Overall coverage
    pub coverage_block: CoverageBlock,
    /// New-code summary
    pub new_coverage_block: NewCoverageBlock,
    /// New-code breakdown
    pub new_methods_coverage: Vec<NewMethodCoverage>,
    /// Package tree
    pub package_coverage: Vec<PackageCoverage>,
    /// Per-test usage
    pub test_usages: Vec<TestUsage>,
    /// Per-test-type coverage
    pub coverage_by_type: Vec<TestTypeSummary>,
}

/// Inputs of one computation
#[derive(Debug, Clone, Copy)]
pub struct CoverageRequest<'a> {
    /// Structural bytes of the build
    pub units: &'a UnitBytes,
    /// Probes to report on
    pub probes: &'a [ProbeRecord],
    /// Methods the build introduced
    pub new_methods: &'a [Method],
    /// Ratio stored by the previous computation for this build
    pub previous_ratio: Option<f64>,
}

impl<'a> CoverageRequest<'a> {
    /// Request without new methods or trend memory
    #[inline]
    #[must_use]
    pub fn new(units: &'a UnitBytes, probes: &'a [ProbeRecord]) -> Self {
        Self {
            units,
            probes,
            new_methods: &[],
            previous_ratio: None,
        }
    }

    /// With the build's new methods
    #[inline]
    #[must_use]
    pub fn with_new_methods(mut self, new_methods: &'a [Method]) -> Self {
        self.new_methods = new_methods;
        self
    }

    /// With the stored ratio
    #[inline]
    #[must_use]
    pub fn with_previous_ratio(mut self, ratio: Option<f64>) -> Self {
        self.previous_ratio = ratio;
        self
    }
}

/// Result of [`compute_info_set`]
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedCoverage {
    /// Fragments
    pub info: CoverageInfoSet,
    /// New total ratio, to be stored as the trend memory
    pub ratio: Option<f64>,
}

/// Run aggregation, diffing, attribution and usage over one probe set
///
/// # Errors
/// Returns `AnalysisError::MalformedUnit` if a unit of the build is unusable
pub fn compute_info_set(
    analyzer: &dyn StructuralAnalyzer,
    request: &CoverageRequest<'_>,
    timestamp: i64,
) -> Result<ComputedCoverage, AnalysisError> {
    let index = ProbeIndex::from_records(request.probes);
    let bundle = BundleCoverage::analyze(analyzer, request.units, &index, Selection::AllUnits)?;
    let associations = AssociationMapper::new(analyzer, request.units).map(request.probes);

    let coverage_block = coverage_block(&bundle, request.previous_ratio);
    let new_code = ClassDiffEngine::new().new_code_coverage(request.new_methods, &bundle);

    tracing::debug!(
        coverage = ?coverage_block.coverage,
        new_methods = new_code.block.methods_count,
        associations = associations.len(),
        "coverage computed"
    );

    let info = CoverageInfoSet {
        associated_tests: associations.to_associated_tests(),
        package_coverage: package_tree(&bundle, &associations),
        test_usages: test_usages(analyzer, request.units, request.probes, timestamp)?,
        coverage_by_type: test_type_summaries(analyzer, request.units, request.probes)?,
        new_coverage_block: new_code.block,
        new_methods_coverage: new_code.methods,
        coverage_block,
    };

    Ok(ComputedCoverage {
        ratio: bundle.ratio(),
        info,
    })
}
