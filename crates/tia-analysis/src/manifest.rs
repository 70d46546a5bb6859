//! Manifest-based structural analyzer
//!
//! Unit bytes are a JSON manifest listing the unit's methods and, per
//! method, the instruction count guarded by each probe:
//!
//! ```json
//! { "methods": [ { "name": "find", "desc": "(I)V", "probes": [3, 2] } ] }
//! ```
//!
//! Probe bits are laid out consecutively across methods in declaration
//! order, so the unit above expects a two-bit bitmap.

use crate::analyzer::{Counter, MethodAnalysis, StructuralAnalyzer, UnitAnalysis};
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// One method of a unit manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMethod {
    /// Method name
    pub name: String,
    /// JVM descriptor
    pub desc: String,
    /// Instructions guarded by each probe
    pub probes: Vec<u64>,
}

impl ManifestMethod {
    /// Create manifest method
    #[must_use]
    pub fn new(name: impl Into<String>, desc: impl Into<String>, probes: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            probes,
        }
    }
}

/// Structural description of one unit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitManifest {
    /// Methods in declaration order
    pub methods: Vec<ManifestMethod>,
}

impl UnitManifest {
    /// Create empty manifest
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method
    #[must_use]
    pub fn with_method(
        mut self,
        name: impl Into<String>,
        desc: impl Into<String>,
        probes: Vec<u64>,
    ) -> Self {
        self.methods.push(ManifestMethod::new(name, desc, probes));
        self
    }

    /// Total probes of the unit
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.methods.iter().map(|m| m.probes.len()).sum()
    }

    /// Encode as unit bytes
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing plain strings and integers cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode unit bytes
    ///
    /// # Errors
    /// Returns `AnalysisError::MalformedUnit` if the bytes are not a manifest
    pub fn from_bytes(unit_name: &str, bytes: &[u8]) -> Result<Self, AnalysisError> {
        serde_json::from_slice(bytes).map_err(|e| AnalysisError::MalformedUnit {
            unit: unit_name.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Analyzer for manifest-encoded units
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestAnalyzer;

impl ManifestAnalyzer {
    /// Create analyzer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StructuralAnalyzer for ManifestAnalyzer {
    fn analyze(
        &self,
        unit_name: &str,
        bytes: &[u8],
        probes: Option<&[bool]>,
    ) -> Result<UnitAnalysis, AnalysisError> {
        let manifest = UnitManifest::from_bytes(unit_name, bytes)?;

        if let Some(bits) = probes {
            let expected = manifest.probe_count();
            if bits.len() != expected {
                return Err(AnalysisError::ProbeCountMismatch {
                    unit: unit_name.to_string(),
                    expected,
                    actual: bits.len(),
                });
            }
        }

        let mut offset = 0;
        let methods = manifest
            .methods
            .into_iter()
            .map(|method| {
                let instructions = method
                    .probes
                    .iter()
                    .enumerate()
                    .map(|(i, count)| {
                        let hit = probes.is_some_and(|bits| bits[offset + i]);
                        Counter::new(if hit { *count } else { 0 }, *count)
                    })
                    .sum();
                offset += method.probes.len();
                MethodAnalysis {
                    name: method.name,
                    desc: method.desc,
                    instructions,
                }
            })
            .collect();

        Ok(UnitAnalysis {
            name: unit_name.to_string(),
            methods,
        })
    }
}
