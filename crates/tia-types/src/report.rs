//! Result fragments pushed to subscribers
//!
//! Each fragment is independently deliverable. Coverage values are ratios
//! in `[0, 1]`; an absent value means the element has no instructions.

use crate::probe::TestType;
use serde::{Deserialize, Serialize};

/// Direction of change of the total coverage ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    /// Strictly greater than the stored ratio
    Increase,
    /// Strictly less than the stored ratio
    Decrease,
}

/// Overall coverage of the analysed units
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageBlock {
    /// Covered / total instructions
    pub coverage: Option<f64>,
    /// Number of classes
    pub classes_count: usize,
    /// Number of methods
    pub methods_count: usize,
    /// Methods without a covered instruction
    pub uncovered_methods_count: usize,
    /// Change against the previous computation for this build
    #[serde(rename = "arrow")]
    pub trend: Option<Trend>,
}

/// Coverage of the methods introduced by the current build
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCoverageBlock {
    /// Number of new methods
    pub methods_count: usize,
    /// New methods with at least one covered instruction
    pub methods_covered: usize,
    /// Covered / total instructions across the new methods
    pub coverage: Option<f64>,
}

impl NewCoverageBlock {
    /// No new methods in this build
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods_count == 0
    }
}

/// Coverage of one new method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMethodCoverage {
    /// Coverage key id of the method
    pub id: String,
    /// Owning class path
    pub owner_class: String,
    /// Method name
    pub name: String,
    /// JVM descriptor
    pub desc: String,
    /// Readable declaration
    pub decl: String,
    /// Covered / total instructions
    pub coverage: Option<f64>,
}

/// Package node of the coverage tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageCoverage {
    /// Coverage key id
    pub id: String,
    /// Package path
    pub name: String,
    /// Covered / total instructions
    pub coverage: Option<f64>,
    /// Classes in the package
    pub total_classes_count: usize,
    /// Classes with a covered method
    pub covered_classes_count: usize,
    /// Methods in the package
    pub total_methods_count: usize,
    /// Methods with a covered instruction
    pub covered_methods_count: usize,
    /// Distinct tests that touched the package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assoc_tests_count: Option<usize>,
    /// Class nodes
    pub classes: Vec<ClassCoverage>,
}

/// Class node of the coverage tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCoverage {
    /// Coverage key id
    pub id: String,
    /// Simple class name
    pub name: String,
    /// Class path
    pub path: String,
    /// Covered / total instructions
    pub coverage: Option<f64>,
    /// Methods in the class
    pub total_methods_count: usize,
    /// Methods with a covered instruction
    pub covered_methods_count: usize,
    /// Distinct tests that touched the class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assoc_tests_count: Option<usize>,
    /// Method leaves
    pub methods: Vec<MethodCoverage>,
}

/// Method leaf of the coverage tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCoverage {
    /// Coverage key id
    pub id: String,
    /// Method name
    pub name: String,
    /// JVM descriptor
    pub desc: String,
    /// Readable declaration
    pub decl: String,
    /// Covered / total instructions
    pub coverage: Option<f64>,
    /// Covered instructions
    pub covered_count: u64,
    /// Total instructions
    pub total_count: u64,
    /// Distinct tests that touched the method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assoc_tests_count: Option<usize>,
}

/// Tests that exercised one code element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedTests {
    /// Coverage key id
    pub id: String,
    /// Package path
    pub package_name: String,
    /// Class path, for class and method elements
    pub class_name: Option<String>,
    /// Method name, for method elements
    pub method_name: Option<String>,
    /// Distinct test names
    pub tests: Vec<String>,
}

/// What one test touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestUsage {
    /// Test name
    pub test_id: String,
    /// Methods with a covered instruction
    pub covered_count: usize,
    /// Kind of the test
    pub test_type: TestType,
    /// Computation time, epoch millis
    pub timestamp: i64,
}

/// Coverage reached by one kind of test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTypeSummary {
    /// Kind of test
    pub test_type: TestType,
    /// Covered / total instructions over all units
    pub coverage: Option<f64>,
    /// Distinct test names of that kind
    pub tests_count: usize,
}

/// Whether the agent is currently collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatheringState {
    /// Collection window open
    pub state: bool,
}
