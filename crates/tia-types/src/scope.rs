//! Scopes and their persistence schema

use crate::ids::AgentId;
use crate::probe::ProbeRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name of the default ("no scope") bucket
pub const DEFAULT_SCOPE: &str = "";

/// Named bucket of probes accumulated between checkout boundaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Scope name; empty for the default bucket
    pub name: String,
    /// Probes in arrival order
    #[serde(default)]
    pub probes: Vec<ProbeRecord>,
    /// Whether the scope counts towards build-level coverage
    #[serde(default = "accounted_default")]
    pub accounted: bool,
}

fn accounted_default() -> bool {
    true
}

impl Scope {
    /// Create empty, accounted scope
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probes: Vec::new(),
            accounted: true,
        }
    }

    /// Mark the scope as excluded from build totals
    #[inline]
    #[must_use]
    pub fn unaccounted(mut self) -> Self {
        self.accounted = false;
        self
    }

    /// Whether this is the default bucket
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_SCOPE
    }
}

/// Kind of a storage entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyKind {
    /// One scope
    Scope,
    /// Set of scope names registered for a build
    ScopeList,
}

/// Address of a persisted value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageKey {
    /// Entry kind
    pub kind: KeyKind,
    /// Owning agent
    pub agent_id: AgentId,
    /// Build the entry belongs to
    pub build_version: String,
    /// Scope name, for [`KeyKind::Scope`] entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_name: Option<String>,
}

impl StorageKey {
    /// Address of one scope
    #[must_use]
    pub fn scope(agent_id: &AgentId, build_version: &str, scope_name: &str) -> Self {
        Self {
            kind: KeyKind::Scope,
            agent_id: agent_id.clone(),
            build_version: build_version.to_string(),
            scope_name: Some(scope_name.to_string()),
        }
    }

    /// Address of a build's scope-name set
    #[must_use]
    pub fn scope_list(agent_id: &AgentId, build_version: &str) -> Self {
        Self {
            kind: KeyKind::ScopeList,
            agent_id: agent_id.clone(),
            build_version: build_version.to_string(),
            scope_name: None,
        }
    }
}

/// Typed value stored under a [`StorageKey`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoredValue {
    /// Value of a [`KeyKind::Scope`] entry
    Scope(Scope),
    /// Value of a [`KeyKind::ScopeList`] entry
    ScopeList(BTreeSet<String>),
}

impl StoredValue {
    /// Kind this value may be stored under
    #[inline]
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Scope(_) => KeyKind::Scope,
            Self::ScopeList(_) => KeyKind::ScopeList,
        }
    }
}
