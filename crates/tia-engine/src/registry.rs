//! Agent registry
//!
//! One worker per agent id. Lookup, creation and info refresh happen under
//! the id's map entry, so concurrent first events for the same agent end
//! up on a single worker.

use crate::error::EngineError;
use crate::worker::{self, AgentCommand, EngineContext};
use dashmap::DashMap;
use std::sync::Arc;
use tia_types::{AgentId, AgentInfo};
use tokio::sync::mpsc;

/// Handle to an agent worker
#[derive(Debug, Clone)]
pub struct AgentHandle {
    info: AgentInfo,
    sender: mpsc::Sender<AgentCommand>,
}

impl AgentHandle {
    /// Enqueue a command, waiting for queue space
    ///
    /// # Errors
    /// Returns `EngineError::AgentUnavailable` if the worker has stopped
    pub async fn send(&self, command: AgentCommand) -> Result<(), EngineError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| EngineError::AgentUnavailable(self.info.id.clone()))
    }

    /// Agent info as last seen by the registry
    #[inline]
    #[must_use]
    pub fn info(&self) -> &AgentInfo {
        &self.info
    }

    /// Worker has stopped
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Concurrent map of agent workers
#[derive(Debug)]
pub struct AgentRegistry {
    agents: DashMap<AgentId, AgentHandle>,
    ctx: Arc<EngineContext>,
}

impl AgentRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            agents: DashMap::new(),
            ctx,
        }
    }

    /// Get, create or refresh the worker of an agent
    ///
    /// A worker whose queue has closed is replaced. Must be called from
    /// within a tokio runtime.
    pub fn handle(&self, info: &AgentInfo) -> AgentHandle {
        let mut entry = self.agents.entry(info.id.clone()).or_insert_with(|| {
            tracing::debug!(agent = %info.id, build = %info.build_version, "spawning agent worker");
            AgentHandle {
                info: info.clone(),
                sender: worker::spawn(info.clone(), Arc::clone(&self.ctx)),
            }
        });
        if entry.is_closed() {
            tracing::warn!(agent = %info.id, "agent worker gone, respawning");
            entry.sender = worker::spawn(info.clone(), Arc::clone(&self.ctx));
        }
        if entry.info != *info {
            entry.info = info.clone();
        }
        entry.value().clone()
    }

    /// Existing handle, without creating one
    #[must_use]
    pub fn get(&self, id: &AgentId) -> Option<AgentHandle> {
        self.agents.get(id).map(|entry| entry.value().clone())
    }

    /// Number of agents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// No agent registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agent registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    /// Drop an agent and stop its worker after its queued commands
    pub async fn remove(&self, id: &AgentId) -> bool {
        let Some((_, handle)) = self.agents.remove(id) else {
            return false;
        };
        if handle.send(AgentCommand::Shutdown).await.is_err() {
            tracing::debug!(agent = %id, "worker already stopped");
        }
        true
    }

    /// Stop every worker
    pub async fn shutdown_all(&self) {
        let ids: Vec<AgentId> = self.agents.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.remove(&id).await;
        }
    }
}
