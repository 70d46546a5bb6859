//! Overall coverage block and trend

use crate::bundle::BundleCoverage;
use tia_types::{CoverageBlock, Trend};

/// Ratio differences below this are not a trend
pub const TREND_EPSILON: f64 = 1e-7;

/// Direction of change between the stored ratio and a new one
///
/// Absent when either side is absent or the difference is within
/// [`TREND_EPSILON`].
#[must_use]
pub fn trend(previous: Option<f64>, current: Option<f64>) -> Option<Trend> {
    let diff = current? - previous?;
    if diff.abs() < TREND_EPSILON {
        None
    } else if diff > 0.0 {
        Some(Trend::Increase)
    } else {
        Some(Trend::Decrease)
    }
}

/// Overall coverage block of a bundle
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn coverage_block(bundle: &BundleCoverage, previous: Option<f64>) -> CoverageBlock {
    let ratio = bundle.ratio();
    let methods = bundle.method_counter();
    CoverageBlock {
        coverage: ratio,
        classes_count: bundle.class_counter().total as usize,
        methods_count: methods.total as usize,
        uncovered_methods_count: methods.missed() as usize,
        trend: trend(previous, ratio),
    }
}
