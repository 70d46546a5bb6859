//! Per-agent actor
//!
//! Each agent gets one task that owns its [`AgentState`] and
//! [`ScopeManager`] and drains an ordered command queue:
//! - commands for one agent are applied strictly in arrival order
//! - coverage computation runs on the blocking pool, never on the queue
//! - an optional idle deadline abandons a stale session
//!
//! Scope persistence goes through synchronous [`Sender`] calls made from
//! the worker task itself.

use crate::config::EngineConfig;
use crate::delivery::{Publisher, ReportLevel};
use crate::error::EngineError;
use crate::scope::{ScopeManager, ScopeRepository};
use crate::sender::Sender;
use crate::state::AgentState;
use std::sync::Arc;
use tia_analysis::{
    compute_info_set, AnalysisError, CoverageInfoSet, CoverageRequest, StructuralAnalyzer,
};
use tia_types::{Action, AgentInfo, ProbeRecord, SessionEvent, DEFAULT_SCOPE};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::Instrument;

/// Collaborators shared by every worker
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Delivery and persistence
    pub sender: Arc<dyn Sender>,
    /// Structural analysis
    pub analyzer: Arc<dyn StructuralAnalyzer>,
    /// Settings
    pub config: EngineConfig,
}

/// Result of dispatching one event or action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// The command changed state
    pub applied: bool,
    /// Coverage computed as a consequence, if any
    pub report: Option<CoverageInfoSet>,
    /// Probes of a scope finalized by a checkout
    pub finalized_probes: Vec<ProbeRecord>,
}

impl DispatchOutcome {
    /// No-op outcome
    #[inline]
    #[must_use]
    pub fn ignored() -> Self {
        Self::default()
    }

    /// Applied without a report
    #[inline]
    #[must_use]
    pub fn applied() -> Self {
        Self {
            applied: true,
            ..Self::default()
        }
    }

    /// Applied with an optional report
    #[inline]
    #[must_use]
    pub fn reported(report: Option<CoverageInfoSet>) -> Self {
        Self {
            applied: true,
            report,
            finalized_probes: Vec::new(),
        }
    }

    fn from_flag(applied: bool) -> Self {
        if applied {
            Self::applied()
        } else {
            Self::ignored()
        }
    }
}

/// Messages accepted by an agent worker
#[derive(Debug)]
pub enum AgentCommand {
    /// Structural or session event
    Event {
        /// Agent info at dispatch time
        info: AgentInfo,
        /// The event
        event: SessionEvent,
        /// Where to report the outcome
        reply: Option<oneshot::Sender<DispatchOutcome>>,
    },
    /// Out-of-band action
    Action {
        /// Agent info at dispatch time
        info: AgentInfo,
        /// The action
        action: Action,
        /// Where to report the outcome
        reply: Option<oneshot::Sender<DispatchOutcome>>,
    },
    /// Stop the worker once the queue is drained up to here
    Shutdown,
}

/// Spawn a worker for `info` and return its queue
pub(crate) fn spawn(info: AgentInfo, ctx: Arc<EngineContext>) -> mpsc::Sender<AgentCommand> {
    let (tx, rx) = mpsc::channel(ctx.config.agent_queue_capacity);
    let span = tracing::info_span!("agent_worker", agent = %info.id);
    let worker = AgentWorker::new(info, ctx);
    tokio::spawn(worker.run(rx).instrument(span));
    tx
}

struct AgentWorker {
    info: AgentInfo,
    ctx: Arc<EngineContext>,
    state: AgentState,
    scopes: ScopeManager,
    publisher: Publisher,
}

impl AgentWorker {
    fn new(info: AgentInfo, ctx: Arc<EngineContext>) -> Self {
        let repository = ScopeRepository::new(
            Arc::clone(&ctx.sender),
            info.id.clone(),
            ctx.config.storage_retry,
        );
        let publisher = Publisher::new(
            Arc::clone(&ctx.sender),
            info.id.clone(),
            ctx.config.delivery_retry,
        );
        Self {
            scopes: ScopeManager::new(repository, info.build_version.clone()),
            state: AgentState::new(),
            publisher,
            info,
            ctx,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<AgentCommand>) {
        if let Err(error) = self.scopes.restore() {
            tracing::warn!(%error, "could not restore active scope");
        }
        tracing::debug!(build = %self.info.build_version, "worker started");

        loop {
            let deadline = self
                .ctx
                .config
                .idle_timeout()
                .and_then(|timeout| self.state.idle_deadline(timeout));
            let command = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(command) => command,
                    Err(_) => {
                        self.abandon_idle().await;
                        continue;
                    }
                },
                None => rx.recv().await,
            };

            match command {
                Some(AgentCommand::Event { info, event, reply }) => {
                    self.info = info;
                    let outcome = self.handle_event(event).await;
                    respond(reply, outcome);
                }
                Some(AgentCommand::Action {
                    info,
                    action,
                    reply,
                }) => {
                    self.info = info;
                    let outcome = self.handle_action(action).await;
                    respond(reply, outcome);
                }
                Some(AgentCommand::Shutdown) | None => break,
            }
        }
        tracing::debug!("worker stopped");
    }

    async fn handle_event(&mut self, event: SessionEvent) -> DispatchOutcome {
        let kind = event.kind();
        let outcome = match event {
            SessionEvent::Init { build_version, .. } => {
                self.state.init(&build_version);
                self.info.build_version.clone_from(&build_version);
                if let Err(error) = self.scopes.switch_build(&build_version) {
                    tracing::warn!(build = %build_version, %error, "could not switch scope build");
                }
                self.announce_scopes().await;
                DispatchOutcome::applied()
            }
            SessionEvent::AddUnit { name, bytes } => {
                DispatchOutcome::from_flag(self.state.add_unit(&name, bytes))
            }
            SessionEvent::Initialized { expected_units, .. } => {
                match self.state.initialized(expected_units, self.ctx.analyzer.as_ref()) {
                    Some(changed) if self.ctx.config.baseline_policy.applies(changed) => {
                        tracing::debug!(changed, "emitting baseline report");
                        DispatchOutcome::reported(self.finish(Vec::new()).await)
                    }
                    Some(_) => DispatchOutcome::applied(),
                    None => DispatchOutcome::ignored(),
                }
            }
            SessionEvent::SessionStarted { session_id } => {
                let applied = self.state.session_started(&session_id, Instant::now());
                if applied {
                    tracing::info!(session = %session_id, "session started");
                    self.publisher.gathering_state(true).await;
                }
                DispatchOutcome::from_flag(applied)
            }
            SessionEvent::ProbePart { records } => {
                DispatchOutcome::from_flag(self.state.probe_part(records, Instant::now()))
            }
            SessionEvent::SessionCancelled { session_id } => {
                let applied = self.state.session_cancelled();
                if applied {
                    tracing::info!(session = %session_id, "session cancelled");
                    self.publisher.gathering_state(false).await;
                }
                DispatchOutcome::from_flag(applied)
            }
            SessionEvent::SessionFinished { session_id } => match self.state.session_finished() {
                Some(probes) => {
                    tracing::info!(session = %session_id, records = probes.len(), "session finished");
                    self.publisher.gathering_state(false).await;
                    DispatchOutcome::reported(self.finish(probes).await)
                }
                None => DispatchOutcome::ignored(),
            },
        };
        if !outcome.applied {
            tracing::debug!(event = kind, phase = %self.state.phase(), "event ignored in current state");
        }
        outcome
    }

    async fn handle_action(&mut self, action: Action) -> DispatchOutcome {
        match action {
            Action::CreateScope { scope_name } => self.switch_scope(&scope_name).await,
            Action::DropScope => self.switch_scope(DEFAULT_SCOPE).await,
            Action::BuildCoverage { build_version } => {
                let current = self.state.classes().map(|data| data.build_version.clone());
                if current.as_deref() != Some(build_version.as_str()) {
                    tracing::warn!(build = %build_version, ?current, "no structural data for build");
                    return DispatchOutcome::ignored();
                }
                match self.scopes.build_probes(&build_version) {
                    Ok(probes) => {
                        DispatchOutcome::reported(self.report(probes, ReportLevel::Build).await)
                    }
                    Err(error) => {
                        tracing::warn!(build = %build_version, %error, "could not load build probes");
                        DispatchOutcome::ignored()
                    }
                }
            }
            Action::ToggleScope {
                scope_name,
                accounted,
            } => match self.scopes.set_accounted(&scope_name, accounted) {
                Ok(found) => {
                    if found {
                        self.announce_scopes().await;
                    }
                    DispatchOutcome::from_flag(found)
                }
                Err(error) => {
                    tracing::warn!(scope = %scope_name, %error, "could not toggle scope");
                    DispatchOutcome::ignored()
                }
            },
        }
    }

    async fn switch_scope(&mut self, name: &str) -> DispatchOutcome {
        let finalized = match self.scopes.checkout(name) {
            Ok(probes) => probes,
            Err(error) => {
                tracing::warn!(scope = name, %error, "scope checkout failed");
                return DispatchOutcome::ignored();
            }
        };
        self.announce_scopes().await;
        let probes = self.scopes.active_probes().to_vec();
        DispatchOutcome {
            applied: true,
            report: self.report(probes, ReportLevel::Scope).await,
            finalized_probes: finalized,
        }
    }

    /// Merge a closed window into the active scope and report on the scope
    async fn finish(&mut self, probes: Vec<ProbeRecord>) -> Option<CoverageInfoSet> {
        if let Err(error) = self.scopes.append(probes) {
            tracing::warn!(scope = %self.scopes.active_name(), %error, "could not persist scope");
        }
        let probes = self.scopes.active_probes().to_vec();
        self.report(probes, ReportLevel::Scope).await
    }

    async fn report(
        &mut self,
        probes: Vec<ProbeRecord>,
        level: ReportLevel,
    ) -> Option<CoverageInfoSet> {
        let data = self.state.classes()?;
        let units = Arc::clone(&data.units);
        let new_methods = Arc::clone(&data.new_methods);
        let previous_ratio = data.last_ratio;
        let analyzer = Arc::clone(&self.ctx.analyzer);
        let timestamp = chrono::Utc::now().timestamp_millis();

        let computation = tokio::task::spawn_blocking(move || {
            let request = CoverageRequest::new(&units, &probes)
                .with_new_methods(&new_methods)
                .with_previous_ratio(previous_ratio);
            compute_info_set(analyzer.as_ref(), &request, timestamp)
        });

        let computed = match joined(computation.await) {
            Ok(computed) => computed,
            Err(error) => {
                tracing::warn!(%error, "coverage computation failed");
                return None;
            }
        };

        self.state.set_last_ratio(computed.ratio);
        self.publisher.deliver(&computed.info, level).await;
        Some(computed.info)
    }

    async fn announce_scopes(&self) {
        match self.scopes.scope_names() {
            Ok(names) => self.publisher.scopes(self.scopes.active_name(), &names).await,
            Err(error) => tracing::warn!(%error, "could not load scope names"),
        }
    }

    async fn abandon_idle(&mut self) {
        let Some(timeout) = self.ctx.config.idle_timeout() else {
            return;
        };
        if let Some(session) = self.state.abandon_if_idle(Instant::now(), timeout) {
            tracing::warn!(session = %session, ?timeout, "abandoning idle session");
            self.publisher.gathering_state(false).await;
        }
    }
}

/// Flatten a blocking computation's join result
fn joined<T>(result: Result<Result<T, AnalysisError>, JoinError>) -> Result<T, EngineError> {
    result
        .map_err(|error| EngineError::Computation(error.to_string()))?
        .map_err(EngineError::from)
}

fn respond(reply: Option<oneshot::Sender<DispatchOutcome>>, outcome: DispatchOutcome) {
    if let Some(reply) = reply {
        // The caller may have stopped waiting.
        let _ = reply.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_computation_is_reported_as_computation_error() {
        let handle = tokio::task::spawn_blocking(|| -> Result<(), AnalysisError> {
            panic!("analyzer blew up");
        });

        assert!(matches!(joined(handle.await), Err(EngineError::Computation(_))));
    }

    #[test]
    fn analysis_failure_keeps_its_source() {
        let failed: Result<Result<(), AnalysisError>, JoinError> =
            Ok(Err(AnalysisError::MalformedUnit {
                unit: "a/B".into(),
                reason: "truncated".into(),
            }));

        let error = joined(failed).unwrap_err();
        assert!(matches!(error, EngineError::Analysis(_)));
        assert!(error.to_string().contains("a/B"));
    }
}
