//! Protocol dispatcher
//!
//! Single entry point of the engine. Events and actions are routed to the
//! agent's worker through the [`AgentRegistry`]; the awaiting variants
//! return once the worker has applied the command and delivered any
//! resulting fragments.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::registry::AgentRegistry;
use crate::sender::Sender;
use crate::worker::{AgentCommand, DispatchOutcome, EngineContext};
use std::sync::Arc;
use tia_analysis::StructuralAnalyzer;
use tia_types::{Action, AgentInfo, CoverageMessage, SessionEvent};
use tokio::sync::oneshot;

/// Coverage session controller
#[derive(Debug)]
pub struct Controller {
    registry: AgentRegistry,
}

impl Controller {
    /// Create controller
    ///
    /// # Errors
    /// Returns `EngineError::Config` if the configuration is invalid
    pub fn new(
        sender: Arc<dyn Sender>,
        analyzer: Arc<dyn StructuralAnalyzer>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let ctx = Arc::new(EngineContext {
            sender,
            analyzer,
            config,
        });
        Ok(Self {
            registry: AgentRegistry::new(ctx),
        })
    }

    /// Enqueue an event without waiting for it to be applied
    ///
    /// Events submitted for one agent are applied in submission order.
    ///
    /// # Errors
    /// Returns `EngineError::AgentUnavailable` if the worker has stopped
    pub async fn submit(&self, info: &AgentInfo, event: SessionEvent) -> Result<(), EngineError> {
        self.registry
            .handle(info)
            .send(AgentCommand::Event {
                info: info.clone(),
                event,
                reply: None,
            })
            .await
    }

    /// Apply an event and wait for its outcome
    ///
    /// # Errors
    /// Returns `EngineError::AgentUnavailable` if the worker has stopped
    pub async fn process_event(
        &self,
        info: &AgentInfo,
        event: SessionEvent,
    ) -> Result<DispatchOutcome, EngineError> {
        let (reply, outcome) = oneshot::channel();
        self.registry
            .handle(info)
            .send(AgentCommand::Event {
                info: info.clone(),
                event,
                reply: Some(reply),
            })
            .await?;
        outcome
            .await
            .map_err(|_| EngineError::AgentUnavailable(info.id.clone()))
    }

    /// Apply an action and wait for its outcome
    ///
    /// # Errors
    /// Returns `EngineError::AgentUnavailable` if the worker has stopped
    pub async fn do_action(
        &self,
        info: &AgentInfo,
        action: Action,
    ) -> Result<DispatchOutcome, EngineError> {
        tracing::info!(agent = %info.id, ?action, "action");
        let (reply, outcome) = oneshot::channel();
        self.registry
            .handle(info)
            .send(AgentCommand::Action {
                info: info.clone(),
                action,
                reply: Some(reply),
            })
            .await?;
        outcome
            .await
            .map_err(|_| EngineError::AgentUnavailable(info.id.clone()))
    }

    /// Decode and apply a raw `{ "type", "data" }` agent message
    ///
    /// Unknown kinds and undecodable payloads are ignored.
    ///
    /// # Errors
    /// Returns `EngineError::AgentUnavailable` if the worker has stopped
    pub async fn process_raw(
        &self,
        info: &AgentInfo,
        raw: &str,
    ) -> Result<DispatchOutcome, EngineError> {
        let message: CoverageMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(agent = %info.id, %error, "undecodable message ignored");
                return Ok(DispatchOutcome::ignored());
            }
        };
        let kind = message.kind.clone();
        match message.decode(info) {
            Ok(Some(event)) => self.process_event(info, event).await,
            Ok(None) => {
                tracing::debug!(agent = %info.id, kind = %kind, "unknown message kind ignored");
                Ok(DispatchOutcome::ignored())
            }
            Err(error) => {
                tracing::warn!(agent = %info.id, kind = %kind, %error, "malformed payload ignored");
                Ok(DispatchOutcome::ignored())
            }
        }
    }

    /// Decode and apply a raw `{ "type", "payload" }` action
    ///
    /// Undecodable actions are ignored.
    ///
    /// # Errors
    /// Returns `EngineError::AgentUnavailable` if the worker has stopped
    pub async fn do_raw_action(
        &self,
        info: &AgentInfo,
        raw: &str,
    ) -> Result<DispatchOutcome, EngineError> {
        match serde_json::from_str::<Action>(raw) {
            Ok(action) => self.do_action(info, action).await,
            Err(error) => {
                tracing::warn!(agent = %info.id, %error, "undecodable action ignored");
                Ok(DispatchOutcome::ignored())
            }
        }
    }

    /// Agent workers
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Stop every agent worker
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }
}
