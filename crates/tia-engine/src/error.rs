//! Error types for the session engine
//!
//! Protocol misuse is never an error here: out-of-order or unknown events
//! are ignored by the controller. These types cover the collaborators
//! (storage, delivery, analysis) and the plumbing between tasks.

use tia_analysis::AnalysisError;
use tia_types::AgentId;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Structural analysis failed
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// Persistence call failed after retries
    #[error("storage error: {0}")]
    Storage(#[source] SenderError),

    /// Result delivery failed after retries
    #[error("delivery to {destination} failed: {source}")]
    Delivery {
        /// Destination topic
        destination: String,
        /// Last failure
        #[source]
        source: SenderError,
    },

    /// Payload (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Agent worker is gone
    #[error("agent {0} is unavailable")]
    AgentUnavailable(AgentId),

    /// Background computation panicked or was cancelled
    #[error("computation failed: {0}")]
    Computation(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Check if the error is worth retrying
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(source) | Self::Delivery { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Errors reported by a [`crate::Sender`] implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SenderError {
    /// Collaborator temporarily unreachable
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Collaborator refused the request
    #[error("rejected: {0}")]
    Rejected(String),
}

impl SenderError {
    /// Transient failures may succeed on retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
