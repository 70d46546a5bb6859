//! Result fragment delivery
//!
//! A [`CoverageInfoSet`] leaves the engine as independent fragments, each
//! on its own topic and each skipped when empty. Build-level fragments
//! carry the `build-` prefix. A fragment that still fails after the retry
//! budget is logged and dropped; the remaining fragments are still sent.

use crate::error::EngineError;
use crate::retry::RetryPolicy;
use crate::sender::Sender;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tia_analysis::CoverageInfoSet;
use tia_types::{AgentId, GatheringState};

/// Element → tests
pub const ASSOCIATED_TESTS: &str = "associated-tests";
/// Overall coverage block
pub const COVERAGE: &str = "coverage";
/// New-code coverage block
pub const COVERAGE_NEW: &str = "coverage-new";
/// Per-new-method coverage
pub const NEW_METHODS: &str = "new-methods";
/// Package tree
pub const COVERAGE_BY_PACKAGES: &str = "coverage-by-packages";
/// Per-test usage
pub const TESTS_USAGES: &str = "tests-usages";
/// Per-test-type coverage
pub const COVERAGE_BY_TYPE: &str = "coverage-by-type";
/// Session open/closed
pub const COLLECTION_STATE: &str = "collection-state";
/// Name of the active scope
pub const ACTIVE_SCOPE: &str = "active-scope";
/// Scope names of the build
pub const SCOPES: &str = "scopes";

/// Which probes a report was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportLevel {
    /// The active scope
    Scope,
    /// Every accounted scope of a build
    Build,
}

impl ReportLevel {
    /// Topic prefix of this level
    #[inline]
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Scope => "",
            Self::Build => "build-",
        }
    }
}

/// Destination path of a topic at a level
#[must_use]
pub fn destination(level: ReportLevel, topic: &str) -> String {
    format!("/{}{topic}", level.prefix())
}

#[derive(Serialize)]
struct ActiveScope<'a> {
    name: &'a str,
}

/// Pushes one agent's fragments through a [`Sender`]
#[derive(Debug, Clone)]
pub struct Publisher {
    sender: Arc<dyn Sender>,
    agent_id: AgentId,
    retry: RetryPolicy,
}

impl Publisher {
    /// Create publisher
    #[must_use]
    pub fn new(sender: Arc<dyn Sender>, agent_id: AgentId, retry: RetryPolicy) -> Self {
        Self {
            sender,
            agent_id,
            retry,
        }
    }

    /// Send every non-empty fragment; returns how many were delivered
    pub async fn deliver(&self, info: &CoverageInfoSet, level: ReportLevel) -> usize {
        let mut delivered = 0;

        if !info.associated_tests.is_empty() {
            delivered += self.attempt(level, ASSOCIATED_TESTS, &info.associated_tests).await;
        }
        if info.coverage_block.classes_count > 0 {
            delivered += self.attempt(level, COVERAGE, &info.coverage_block).await;
        }
        if !info.new_coverage_block.is_empty() {
            delivered += self.attempt(level, COVERAGE_NEW, &info.new_coverage_block).await;
        }
        if !info.new_methods_coverage.is_empty() {
            delivered += self.attempt(level, NEW_METHODS, &info.new_methods_coverage).await;
        }
        if !info.package_coverage.is_empty() {
            delivered += self.attempt(level, COVERAGE_BY_PACKAGES, &info.package_coverage).await;
        }
        if !info.test_usages.is_empty() {
            delivered += self.attempt(level, TESTS_USAGES, &info.test_usages).await;
        }
        if !info.coverage_by_type.is_empty() {
            delivered += self.attempt(level, COVERAGE_BY_TYPE, &info.coverage_by_type).await;
        }

        tracing::debug!(agent = %self.agent_id, ?level, delivered, "fragments delivered");
        delivered
    }

    /// Announce whether a session is collecting
    pub async fn gathering_state(&self, state: bool) {
        self.attempt(ReportLevel::Scope, COLLECTION_STATE, &GatheringState { state })
            .await;
    }

    /// Announce the active scope and the build's scope names
    pub async fn scopes(&self, active: &str, names: &BTreeSet<String>) {
        self.attempt(ReportLevel::Scope, ACTIVE_SCOPE, &ActiveScope { name: active })
            .await;
        self.attempt(ReportLevel::Scope, SCOPES, names).await;
    }

    /// Serialize and send one payload with retries
    ///
    /// # Errors
    /// - `EngineError::Serialization` if the payload cannot be encoded
    /// - `EngineError::Delivery` once the retry budget is spent
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        payload: &T,
    ) -> Result<(), EngineError> {
        let payload = serde_json::to_string(payload)?;
        self.retry
            .run_async(|| self.sender.send(&self.agent_id, destination, payload.clone()))
            .await
            .map_err(|source| EngineError::Delivery {
                destination: destination.to_string(),
                source,
            })
    }

    async fn attempt<T: Serialize + ?Sized>(
        &self,
        level: ReportLevel,
        topic: &str,
        payload: &T,
    ) -> usize {
        match self.publish(&destination(level, topic), payload).await {
            Ok(()) => 1,
            Err(error) => {
                tracing::warn!(agent = %self.agent_id, %error, "dropping fragment");
                0
            }
        }
    }
}
