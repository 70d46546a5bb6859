//! Named probe buckets and their typed persistence
//!
//! The store behind [`Sender`] is untyped; [`ScopeRepository`] gives each
//! key kind its own accessor so no read needs a cast. Read-then-write
//! pairs against the store are not atomic.

use crate::error::EngineError;
use crate::retry::RetryPolicy;
use crate::sender::Sender;
use std::collections::BTreeSet;
use std::sync::Arc;
use tia_types::{AgentId, ProbeRecord, Scope, StorageKey, StoredValue, DEFAULT_SCOPE};

/// Typed accessors for one agent's scope entries
#[derive(Debug, Clone)]
pub struct ScopeRepository {
    sender: Arc<dyn Sender>,
    agent_id: AgentId,
    retry: RetryPolicy,
}

impl ScopeRepository {
    /// Create repository
    #[must_use]
    pub fn new(sender: Arc<dyn Sender>, agent_id: AgentId, retry: RetryPolicy) -> Self {
        Self {
            sender,
            agent_id,
            retry,
        }
    }

    /// Stored scope, absent if never saved
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn load_scope(&self, build_version: &str, name: &str) -> Result<Option<Scope>, EngineError> {
        let key = StorageKey::scope(&self.agent_id, build_version, name);
        match self.retrieve(&key)? {
            Some(StoredValue::Scope(scope)) => Ok(Some(scope)),
            Some(other) => {
                tracing::warn!(?key, found = ?other.kind(), "unexpected value kind, treating as absent");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Persist a scope
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn save_scope(&self, build_version: &str, scope: &Scope) -> Result<(), EngineError> {
        let key = StorageKey::scope(&self.agent_id, build_version, &scope.name);
        self.store(&key, StoredValue::Scope(scope.clone()))
    }

    /// Scope names registered for a build; absent and empty look the same
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn load_scope_names(&self, build_version: &str) -> Result<BTreeSet<String>, EngineError> {
        let key = StorageKey::scope_list(&self.agent_id, build_version);
        match self.retrieve(&key)? {
            Some(StoredValue::ScopeList(names)) => Ok(names),
            Some(other) => {
                tracing::warn!(?key, found = ?other.kind(), "unexpected value kind, treating as absent");
                Ok(BTreeSet::new())
            }
            None => Ok(BTreeSet::new()),
        }
    }

    /// Persist a build's scope names
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn save_scope_names(
        &self,
        build_version: &str,
        names: &BTreeSet<String>,
    ) -> Result<(), EngineError> {
        let key = StorageKey::scope_list(&self.agent_id, build_version);
        self.store(&key, StoredValue::ScopeList(names.clone()))
    }

    fn retrieve(&self, key: &StorageKey) -> Result<Option<StoredValue>, EngineError> {
        self.retry
            .run_sync(|| self.sender.retrieve(key))
            .map_err(EngineError::Storage)
    }

    fn store(&self, key: &StorageKey, value: StoredValue) -> Result<(), EngineError> {
        debug_assert_eq!(
            value.kind(),
            key.kind,
            "value kind must match the key it is stored under"
        );
        self.retry
            .run_sync(|| self.sender.store(key, value.clone()))
            .map_err(EngineError::Storage)
    }
}

/// Active scope of one agent plus build-level probe assembly
#[derive(Debug)]
pub struct ScopeManager {
    repository: ScopeRepository,
    build_version: String,
    active: Scope,
}

impl ScopeManager {
    /// Manager with an empty default scope; call [`Self::restore`] to load it
    #[must_use]
    pub fn new(repository: ScopeRepository, build_version: impl Into<String>) -> Self {
        Self {
            repository,
            build_version: build_version.into(),
            active: Scope::new(DEFAULT_SCOPE),
        }
    }

    /// Load the active scope from the store and register its name
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn restore(&mut self) -> Result<(), EngineError> {
        let name = self.active.name.clone();
        self.active = self.load_or_create(&name)?;
        self.register(&name)?;
        Ok(())
    }

    /// Name of the active scope
    #[inline]
    #[must_use]
    pub fn active_name(&self) -> &str {
        &self.active.name
    }

    /// Probes accumulated in the active scope
    #[inline]
    #[must_use]
    pub fn active_probes(&self) -> &[ProbeRecord] {
        &self.active.probes
    }

    /// Build the active scope belongs to
    #[inline]
    #[must_use]
    pub fn build_version(&self) -> &str {
        &self.build_version
    }

    /// Move to another build, keeping the active scope's name
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn switch_build(&mut self, build_version: &str) -> Result<(), EngineError> {
        if self.build_version == build_version {
            return self.register(&self.active.name.clone());
        }
        self.repository.save_scope(&self.build_version, &self.active)?;
        self.build_version = build_version.to_string();
        self.restore()
    }

    /// Finalize the active scope and activate `name`
    ///
    /// Returns the probes of the finalized scope. An empty name selects the
    /// default bucket.
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn checkout(&mut self, name: &str) -> Result<Vec<ProbeRecord>, EngineError> {
        self.repository.save_scope(&self.build_version, &self.active)?;
        let next = self.load_or_create(name)?;
        let finalized = std::mem::replace(&mut self.active, next);
        self.register(name)?;
        tracing::info!(from = %finalized.name, to = name, build = %self.build_version, "scope checkout");
        Ok(finalized.probes)
    }

    /// Merge a finished window into the active scope
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn append(&mut self, probes: Vec<ProbeRecord>) -> Result<(), EngineError> {
        self.active.probes.extend(probes);
        self.repository.save_scope(&self.build_version, &self.active)
    }

    /// Scope names registered for the current build
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn scope_names(&self) -> Result<BTreeSet<String>, EngineError> {
        self.repository.load_scope_names(&self.build_version)
    }

    /// Probes of every accounted scope of a build, concatenated
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn build_probes(&self, build_version: &str) -> Result<Vec<ProbeRecord>, EngineError> {
        let mut probes = Vec::new();
        for name in self.repository.load_scope_names(build_version)? {
            let scope = if build_version == self.build_version && name == self.active.name {
                Some(self.active.clone())
            } else {
                self.repository.load_scope(build_version, &name)?
            };
            match scope {
                Some(scope) if scope.accounted => probes.extend(scope.probes),
                Some(_) => tracing::debug!(scope = %name, "skipping unaccounted scope"),
                None => {}
            }
        }
        Ok(probes)
    }

    /// Include or exclude a scope of the current build from build totals
    ///
    /// Returns `false` if no such scope exists.
    ///
    /// # Errors
    /// Returns `EngineError::Storage` if the store keeps failing
    pub fn set_accounted(&mut self, name: &str, accounted: bool) -> Result<bool, EngineError> {
        if name == self.active.name {
            self.active.accounted = accounted;
            self.repository.save_scope(&self.build_version, &self.active)?;
            return Ok(true);
        }
        match self.repository.load_scope(&self.build_version, name)? {
            Some(mut scope) => {
                scope.accounted = accounted;
                self.repository.save_scope(&self.build_version, &scope)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load_or_create(&self, name: &str) -> Result<Scope, EngineError> {
        if let Some(scope) = self.repository.load_scope(&self.build_version, name)? {
            return Ok(scope);
        }
        let scope = Scope::new(name);
        self.repository.save_scope(&self.build_version, &scope)?;
        Ok(scope)
    }

    fn register(&self, name: &str) -> Result<(), EngineError> {
        let mut names = self.repository.load_scope_names(&self.build_version)?;
        if names.insert(name.to_string()) {
            self.repository.save_scope_names(&self.build_version, &names)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::MemorySender;
    use tia_types::TestType;

    fn manager(sender: &Arc<MemorySender>) -> ScopeManager {
        let repository = ScopeRepository::new(
            sender.clone(),
            AgentId::new("agent"),
            RetryPolicy::new(3, 0),
        );
        let mut manager = ScopeManager::new(repository, "1.0");
        manager.restore().unwrap();
        manager
    }

    fn record(test: &str) -> ProbeRecord {
        ProbeRecord::new(1, "a/B", vec![true]).with_test(test, TestType::Auto)
    }

    #[test]
    fn restore_registers_default_scope() {
        let sender = Arc::new(MemorySender::new());
        let manager = manager(&sender);

        assert_eq!(manager.active_name(), DEFAULT_SCOPE);
        assert!(manager.scope_names().unwrap().contains(DEFAULT_SCOPE));
    }

    #[test]
    fn checkout_returns_finalized_probes() {
        let sender = Arc::new(MemorySender::new());
        let mut manager = manager(&sender);
        manager.append(vec![record("t1")]).unwrap();

        let finalized = manager.checkout("smoke").unwrap();

        assert_eq!(finalized, vec![record("t1")]);
        assert_eq!(manager.active_name(), "smoke");
        assert!(manager.active_probes().is_empty());

        let names = manager.scope_names().unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("smoke"));
    }

    #[test]
    fn checkout_back_reloads_stored_scope() {
        let sender = Arc::new(MemorySender::new());
        let mut manager = manager(&sender);
        manager.checkout("smoke").unwrap();
        manager.append(vec![record("t1")]).unwrap();
        manager.checkout("").unwrap();

        manager.checkout("smoke").unwrap();
        assert_eq!(manager.active_probes().len(), 1);
    }

    #[test]
    fn build_probes_skip_unaccounted_scopes() {
        let sender = Arc::new(MemorySender::new());
        let mut manager = manager(&sender);
        manager.append(vec![record("regression")]).unwrap();
        manager.checkout("exploratory").unwrap();
        manager.append(vec![record("manual")]).unwrap();
        assert!(manager.set_accounted("exploratory", false).unwrap());

        let probes = manager.build_probes("1.0").unwrap();

        assert_eq!(probes, vec![record("regression")]);
    }

    #[test]
    fn build_probes_of_unknown_build_are_empty() {
        let sender = Arc::new(MemorySender::new());
        let manager = manager(&sender);
        assert!(manager.build_probes("9.9").unwrap().is_empty());
    }

    #[test]
    fn set_accounted_on_missing_scope() {
        let sender = Arc::new(MemorySender::new());
        let mut manager = manager(&sender);
        assert!(!manager.set_accounted("nope", false).unwrap());
    }

    #[test]
    fn switch_build_keeps_scope_name_and_starts_empty() {
        let sender = Arc::new(MemorySender::new());
        let mut manager = manager(&sender);
        manager.checkout("smoke").unwrap();
        manager.append(vec![record("t1")]).unwrap();

        manager.switch_build("1.1").unwrap();

        assert_eq!(manager.active_name(), "smoke");
        assert!(manager.active_probes().is_empty());
        assert_eq!(manager.build_probes("1.0").unwrap().len(), 1);
    }

    #[test]
    fn transient_store_failures_are_retried() {
        let sender = Arc::new(MemorySender::new());
        let mut manager = manager(&sender);
        sender.fail_next_stores(2);

        assert!(manager.append(vec![record("t1")]).is_ok());
    }

    #[test]
    fn wrong_value_kind_reads_as_absent() {
        let sender = Arc::new(MemorySender::new());
        let agent = AgentId::new("agent");
        let key = StorageKey::scope_list(&agent, "1.0");
        sender
            .store(&key, StoredValue::Scope(Scope::new("bogus")))
            .unwrap();
        let repository = ScopeRepository::new(sender.clone(), agent, RetryPolicy::none());

        assert!(repository.load_scope_names("1.0").unwrap().is_empty());
    }
}
