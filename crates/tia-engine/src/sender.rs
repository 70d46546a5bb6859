//! Outbound collaborator: push delivery and scope persistence
//!
//! The transport and the key/value store live outside the engine. The
//! engine talks to both through [`Sender`]; [`MemorySender`] keeps
//! everything in process.

use crate::error::SenderError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tia_types::{AgentId, StorageKey, StoredValue};

/// Push delivery and key/value persistence
#[async_trait]
pub trait Sender: Send + Sync + fmt::Debug {
    /// Push a payload to an agent's subscribers
    async fn send(
        &self,
        agent_id: &AgentId,
        destination: &str,
        payload: String,
    ) -> Result<(), SenderError>;

    /// Persist a value (blocking)
    fn store(&self, key: &StorageKey, value: StoredValue) -> Result<(), SenderError>;

    /// Read a value back (blocking)
    fn retrieve(&self, key: &StorageKey) -> Result<Option<StoredValue>, SenderError>;
}

/// One pushed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Target agent
    pub agent_id: AgentId,
    /// Destination topic
    pub destination: String,
    /// JSON payload
    pub payload: String,
}

impl Delivery {
    /// Payload parsed as JSON
    ///
    /// # Errors
    /// Returns the parse error for a non-JSON payload
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// In-process [`Sender`]
#[derive(Debug, Default)]
pub struct MemorySender {
    entries: DashMap<StorageKey, StoredValue>,
    deliveries: Mutex<Vec<Delivery>>,
    failing_sends: AtomicUsize,
    failing_stores: AtomicUsize,
}

impl MemorySender {
    /// Create empty sender
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything pushed so far
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Payloads pushed to one destination
    #[must_use]
    pub fn deliveries_to(&self, destination: &str) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.destination == destination)
            .cloned()
            .collect()
    }

    /// Forget recorded deliveries
    pub fn clear_deliveries(&self) {
        self.deliveries.lock().clear();
    }

    /// Stored value, if any
    #[must_use]
    pub fn stored(&self, key: &StorageKey) -> Option<StoredValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Fail the next `count` sends with a transient error
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` stores with a transient error
    pub fn fail_next_stores(&self, count: usize) {
        self.failing_stores.store(count, Ordering::SeqCst);
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Sender for MemorySender {
    async fn send(
        &self,
        agent_id: &AgentId,
        destination: &str,
        payload: String,
    ) -> Result<(), SenderError> {
        if take_failure(&self.failing_sends) {
            return Err(SenderError::Unavailable("injected send failure".into()));
        }
        self.deliveries.lock().push(Delivery {
            agent_id: agent_id.clone(),
            destination: destination.to_string(),
            payload,
        });
        Ok(())
    }

    fn store(&self, key: &StorageKey, value: StoredValue) -> Result<(), SenderError> {
        if take_failure(&self.failing_stores) {
            return Err(SenderError::Unavailable("injected store failure".into()));
        }
        self.entries.insert(key.clone(), value);
        Ok(())
    }

    fn retrieve(&self, key: &StorageKey) -> Result<Option<StoredValue>, SenderError> {
        Ok(self.stored(key))
    }
}
