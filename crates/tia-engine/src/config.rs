//! Engine configuration

use crate::error::EngineError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// When `Initialized` emits a synthetic zero-probe session finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Only when the build is structurally unchanged
    #[default]
    OnUnchanged,
    /// Only when the build changed
    OnChanged,
    /// After every freeze
    Always,
    /// Never
    Never,
}

impl BaselinePolicy {
    /// Whether a freeze with the given `changed` flag emits a baseline
    #[inline]
    #[must_use]
    pub fn applies(self, changed: bool) -> bool {
        match self {
            Self::OnUnchanged => !changed,
            Self::OnChanged => changed,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of each agent's ordered queue
    pub agent_queue_capacity: usize,
    /// Idle seconds in `Collecting` before the session is abandoned; 0 disables
    pub session_idle_timeout_secs: u64,
    /// Synthetic finish on `Initialized`
    pub baseline_policy: BaselinePolicy,
    /// Retry for result delivery
    pub delivery_retry: RetryPolicy,
    /// Retry for store/retrieve
    pub storage_retry: RetryPolicy,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML configuration
    ///
    /// # Errors
    /// Returns `EngineError::Config` if the document is invalid
    pub fn from_toml_str(source: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(source).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load TOML configuration from a file
    ///
    /// # Errors
    /// Returns `EngineError::Config` if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `EngineError::Config` for a zero queue capacity
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.agent_queue_capacity == 0 {
            return Err(EngineError::Config(
                "agent_queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// With queue capacity
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.agent_queue_capacity = capacity;
        self
    }

    /// With idle timeout
    #[inline]
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout_secs = timeout.as_secs();
        self
    }

    /// With baseline policy
    #[inline]
    #[must_use]
    pub fn with_baseline_policy(mut self, policy: BaselinePolicy) -> Self {
        self.baseline_policy = policy;
        self
    }

    /// With delivery retry
    #[inline]
    #[must_use]
    pub fn with_delivery_retry(mut self, retry: RetryPolicy) -> Self {
        self.delivery_retry = retry;
        self
    }

    /// With storage retry
    #[inline]
    #[must_use]
    pub fn with_storage_retry(mut self, retry: RetryPolicy) -> Self {
        self.storage_retry = retry;
        self
    }

    /// Idle timeout, if enabled
    #[inline]
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.session_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.session_idle_timeout_secs))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_queue_capacity: 1024,
            session_idle_timeout_secs: 0,
            baseline_policy: BaselinePolicy::default(),
            delivery_retry: RetryPolicy::default(),
            storage_retry: RetryPolicy::new(3, 0),
        }
    }
}
