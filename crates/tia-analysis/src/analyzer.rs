//! Structural analyzer seam
//!
//! Translating raw unit bytes plus a probe bitmap into per-method
//! instruction counts is a fixed binary-format concern. The engine only
//! depends on this trait; [`crate::ManifestAnalyzer`] is the bundled
//! implementation.

use crate::error::AnalysisError;
use std::collections::BTreeMap;
use std::fmt;
use tia_types::Method;

/// Structural bytes of a build, keyed by unit name
pub type UnitBytes = BTreeMap<String, Vec<u8>>;

/// Covered / total pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counter {
    /// Covered items
    pub covered: u64,
    /// All items
    pub total: u64,
}

impl Counter {
    /// Create counter
    #[inline]
    #[must_use]
    pub fn new(covered: u64, total: u64) -> Self {
        Self { covered, total }
    }

    /// Items not covered
    #[inline]
    #[must_use]
    pub fn missed(self) -> u64 {
        self.total - self.covered
    }

    /// Covered / total, absent when there is nothing to cover
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(self) -> Option<f64> {
        (self.total > 0).then(|| self.covered as f64 / self.total as f64)
    }

    /// At least one covered item
    #[inline]
    #[must_use]
    pub fn is_covered(self) -> bool {
        self.covered > 0
    }
}

impl std::ops::Add for Counter {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.covered + rhs.covered, self.total + rhs.total)
    }
}

impl std::iter::Sum for Counter {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, c| acc + c)
    }
}

/// Instruction counts of one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodAnalysis {
    /// Method name
    pub name: String,
    /// JVM descriptor
    pub desc: String,
    /// Instruction counter
    pub instructions: Counter,
}

/// Analysis result of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitAnalysis {
    /// Unit name
    pub name: String,
    /// Methods in declaration order
    pub methods: Vec<MethodAnalysis>,
}

impl UnitAnalysis {
    /// Structural method set of the unit
    pub fn method_identities(&self) -> impl Iterator<Item = Method> + '_ {
        self.methods
            .iter()
            .map(|m| Method::new(self.name.clone(), m.name.clone(), m.desc.clone()))
    }
}

/// Compiled-unit bytes + probe bitmap → instruction totals
pub trait StructuralAnalyzer: Send + Sync + fmt::Debug {
    /// Analyze one unit against an optional bitmap
    ///
    /// Without a bitmap every instruction counts as missed.
    ///
    /// # Errors
    /// - `AnalysisError::MalformedUnit` if the bytes cannot be interpreted
    /// - `AnalysisError::ProbeCountMismatch` if the bitmap does not fit
    fn analyze(
        &self,
        unit_name: &str,
        bytes: &[u8],
        probes: Option<&[bool]>,
    ) -> Result<UnitAnalysis, AnalysisError>;

    /// Structural method set of one unit
    ///
    /// # Errors
    /// Returns `AnalysisError::MalformedUnit` if the bytes cannot be interpreted
    fn methods(&self, unit_name: &str, bytes: &[u8]) -> Result<Vec<Method>, AnalysisError> {
        Ok(self
            .analyze(unit_name, bytes, None)?
            .method_identities()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_ratio_absent_without_total() {
        assert_eq!(Counter::default().ratio(), None);
        assert_eq!(Counter::new(1, 4).ratio(), Some(0.25));
        assert_eq!(Counter::new(1, 4).missed(), 3);
    }

    #[test]
    fn counters_sum() {
        let sum: Counter = [Counter::new(1, 2), Counter::new(3, 5)].into_iter().sum();
        assert_eq!(sum, Counter::new(4, 7));
        assert!(sum.is_covered());
    }
}
