//! Agent identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a running application instance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create agent id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Agent as known to the administration layer
///
/// Owned externally; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    /// Agent id
    pub id: AgentId,
    /// Currently deployed build
    pub build_version: String,
}

impl AgentInfo {
    /// Create agent info
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, build_version: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(id),
            build_version: build_version.into(),
        }
    }

    /// Same agent with another build deployed
    #[inline]
    #[must_use]
    pub fn with_build(mut self, build_version: impl Into<String>) -> Self {
        self.build_version = build_version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_is_transparent_in_json() {
        let id = AgentId::new("petclinic");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"petclinic\"");
    }

    #[test]
    fn agent_info_with_build() {
        let info = AgentInfo::new("a", "1.0").with_build("1.1");
        assert_eq!(info.build_version, "1.1");
        assert_eq!(info.id.as_str(), "a");
    }
}
