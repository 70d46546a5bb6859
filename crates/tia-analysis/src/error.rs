//! Error types for coverage analysis

/// Structural analysis errors
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Unit bytes could not be interpreted
    #[error("malformed unit {unit}: {reason}")]
    MalformedUnit {
        /// Unit name
        unit: String,
        /// Decoder message
        reason: String,
    },

    /// Probe bitmap does not fit the unit's structure
    #[error("probe count mismatch for {unit}: expected {expected}, got {actual}")]
    ProbeCountMismatch {
        /// Unit name
        unit: String,
        /// Probes declared by the unit
        expected: usize,
        /// Bits in the bitmap
        actual: usize,
    },
}

impl AnalysisError {
    /// Whether the unit itself is unusable (as opposed to one bitmap)
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::MalformedUnit { .. })
    }
}
