//! TIA Analysis - coverage computation
//!
//! Pure, CPU-bound computations driven by a [`StructuralAnalyzer`]:
//! - Bundle aggregation at method/class/package granularity
//! - Trend of the total ratio against the stored one
//! - New-method diff between two adjacent builds
//! - Per-test attribution of covered elements
//! - Test usage and per-test-type summaries
//!
//! # Example
//!
//! ```rust,ignore
//! use tia_analysis::{compute_info_set, CoverageRequest, ManifestAnalyzer};
//!
//! let analyzer = ManifestAnalyzer::new();
//! let request = CoverageRequest::new(&units, &probes);
//! let computed = compute_info_set(&analyzer, &request, 0)?;
//! println!("coverage: {:?}", computed.info.coverage_block.coverage);
//! ```

#![warn(unreachable_pub)]

pub mod aggregate;
pub mod analyzer;
pub mod association;
pub mod bundle;
pub mod diff;
pub mod error;
pub mod info_set;
pub mod manifest;
pub mod probes;
pub mod tree;
pub mod usage;

pub use aggregate::{coverage_block, trend, TREND_EPSILON};
pub use analyzer::{Counter, MethodAnalysis, StructuralAnalyzer, UnitAnalysis, UnitBytes};
pub use association::{AssociationMap, AssociationMapper};
pub use bundle::{BundleCoverage, ClassNode, MethodNode, PackageNode, Selection};
pub use diff::{ClassDiffEngine, NewCodeCoverage};
pub use error::AnalysisError;
pub use info_set::{compute_info_set, ComputedCoverage, CoverageInfoSet, CoverageRequest};
pub use manifest::{ManifestAnalyzer, ManifestMethod, UnitManifest};
pub use probes::ProbeIndex;
pub use tree::package_tree;
pub use usage::{test_type_summaries, test_usages};
