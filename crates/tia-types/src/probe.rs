//! Execution probe records
//!
//! A [`ProbeRecord`] is the hit/miss bitmap of one compiled unit as emitted
//! by an agent, optionally tagged with the test that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of test that produced a probe record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TestType {
    /// Automated test run
    Auto,
    /// Manual exploratory run
    Manual,
    /// Performance run
    Performance,
    /// Unknown or missing label
    #[default]
    Undefined,
}

impl TestType {
    /// Parse a wire label; anything unexpected becomes [`TestType::Undefined`]
    #[must_use]
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("AUTO") => Self::Auto,
            Some("MANUAL") => Self::Manual,
            Some("PERFORMANCE") => Self::Performance,
            _ => Self::Undefined,
        }
    }

    /// Wire label
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
            Self::Performance => "PERFORMANCE",
            Self::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for TestType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for TestType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(Self::from_label(label.as_deref()))
    }
}

/// Probe bitmap of one compiled unit
///
/// Immutable once emitted by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRecord {
    /// Content-derived id of the unit the bitmap was recorded against
    pub id: i64,
    /// Qualified unit name (`com/acme/Owner`)
    #[serde(alias = "className")]
    pub unit_name: String,
    /// Hit/miss bit per probe
    pub probes: Vec<bool>,
    /// Test that produced the bitmap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    /// Kind of that test
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<TestType>,
}

impl ProbeRecord {
    /// Create untagged record
    #[must_use]
    pub fn new(id: i64, unit_name: impl Into<String>, probes: Vec<bool>) -> Self {
        Self {
            id,
            unit_name: unit_name.into(),
            probes,
            test_name: None,
            test_type: None,
        }
    }

    /// Tag with the producing test
    #[inline]
    #[must_use]
    pub fn with_test(mut self, name: impl Into<String>, test_type: TestType) -> Self {
        self.test_name = Some(name.into());
        self.test_type = Some(test_type);
        self
    }

    /// Test type, defaulting to undefined
    #[inline]
    #[must_use]
    pub fn effective_test_type(&self) -> TestType {
        self.test_type.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parses_known_labels() {
        assert_eq!(TestType::from_label(Some("AUTO")), TestType::Auto);
        assert_eq!(TestType::from_label(Some("MANUAL")), TestType::Manual);
        assert_eq!(TestType::from_label(Some("PERFORMANCE")), TestType::Performance);
        assert_eq!(TestType::from_label(Some("UNDEFINED")), TestType::Undefined);
    }

    #[test]
    fn test_type_unexpected_label_is_undefined() {
        assert_eq!(TestType::from_label(None), TestType::Undefined);
        assert_eq!(TestType::from_label(Some("asdf")), TestType::Undefined);

        let parsed: TestType = serde_json::from_str("\"smoke\"").unwrap();
        assert_eq!(parsed, TestType::Undefined);
    }

    #[test]
    fn probe_record_wire_shape() {
        let json = r#"{"id":7,"className":"a/B","probes":[true,false],"testName":"t1","testType":"AUTO"}"#;
        let record: ProbeRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.unit_name, "a/B");
        assert_eq!(record.probes, vec![true, false]);
        assert_eq!(record.test_name.as_deref(), Some("t1"));
        assert_eq!(record.effective_test_type(), TestType::Auto);
    }

    #[test]
    fn untagged_record_omits_test_fields() {
        let record = ProbeRecord::new(1, "a/B", vec![true]);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("testName"));
        assert_eq!(record.effective_test_type(), TestType::Undefined);
    }
}
