//! Per-agent session state machine
//!
//! `Uninitialized → Loading → Ready → Collecting`, with `Collecting → Ready`
//! on finish, cancel or idle abandonment. Every transition method reports
//! whether it applied; a `false`/`None` means the event is a no-op in the
//! current state.

use crate::classes::{AgentData, ClassesBuilder, ClassesData};
use crate::probe_store::ProbeStore;
use std::fmt;
use std::time::Duration;
use tia_analysis::StructuralAnalyzer;
use tia_types::ProbeRecord;
use tokio::time::Instant;

/// Observable phase of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentPhase {
    /// No build announced yet
    Uninitialized,
    /// Units are being ingested
    Loading,
    /// Build frozen, no session open
    Ready,
    /// Session open, probes are accepted
    Collecting,
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Collecting => "collecting",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
struct OpenSession {
    id: String,
    last_activity: Instant,
}

/// Session state of one agent
#[derive(Debug, Default)]
pub struct AgentState {
    data: AgentData,
    session: Option<OpenSession>,
    probes: ProbeStore,
}

impl AgentState {
    /// Fresh, uninitialized state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> AgentPhase {
        match (&self.data, &self.session) {
            (AgentData::NoData, _) => AgentPhase::Uninitialized,
            (AgentData::Loading(_), _) => AgentPhase::Loading,
            (AgentData::Ready(_), None) => AgentPhase::Ready,
            (AgentData::Ready(_), Some(_)) => AgentPhase::Collecting,
        }
    }

    /// Structural data as it stands
    #[inline]
    #[must_use]
    pub fn data(&self) -> &AgentData {
        &self.data
    }

    /// Frozen build snapshot, if any
    #[inline]
    #[must_use]
    pub fn classes(&self) -> Option<&ClassesData> {
        self.data.ready()
    }

    /// Id of the open session
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// Records in the open window
    #[inline]
    #[must_use]
    pub fn pending_probes(&self) -> usize {
        self.probes.len()
    }

    /// Store the trend memory of the current build
    pub fn set_last_ratio(&mut self, ratio: Option<f64>) {
        if let AgentData::Ready(data) = &mut self.data {
            data.last_ratio = ratio;
        }
    }

    /// Start loading a build
    ///
    /// Valid in every phase. A frozen build becomes the previous build; an
    /// open session and a half-loaded buffer are dropped.
    pub fn init(&mut self, build_version: &str) {
        if self.session.take().is_some() {
            tracing::warn!(build = build_version, "build init while collecting, dropping window");
            self.probes.cancel();
        }
        let previous = match &self.data {
            AgentData::Ready(data) => Some(data.to_previous()),
            AgentData::Loading(builder) => builder.previous.clone(),
            AgentData::NoData => None,
        };
        self.data = AgentData::Loading(ClassesBuilder::new(build_version, previous));
    }

    /// Buffer a unit; only applies while loading
    pub fn add_unit(&mut self, name: &str, bytes: Vec<u8>) -> bool {
        match &mut self.data {
            AgentData::Loading(builder) => {
                builder.add_unit(name, bytes);
                true
            }
            AgentData::NoData | AgentData::Ready(_) => false,
        }
    }

    /// Freeze the buffer; returns the `changed` flag of the new snapshot
    ///
    /// With `expected_units > 0` and fewer units ingested the agent stays
    /// in `Loading` and `None` is returned.
    pub fn initialized(
        &mut self,
        expected_units: usize,
        analyzer: &dyn StructuralAnalyzer,
    ) -> Option<bool> {
        let AgentData::Loading(builder) = &self.data else {
            return None;
        };
        if expected_units > 0 && builder.len() < expected_units {
            tracing::warn!(
                build = %builder.build_version,
                received = builder.len(),
                expected = expected_units,
                "initialized before every unit arrived, still loading"
            );
            return None;
        }
        let AgentData::Loading(builder) = std::mem::take(&mut self.data) else {
            return None;
        };
        let data = builder.freeze(analyzer);
        let changed = data.changed;
        tracing::info!(
            build = %data.build_version,
            units = data.units.len(),
            new_methods = data.new_methods.len(),
            changed,
            "build frozen"
        );
        self.data = AgentData::Ready(data);
        Some(changed)
    }

    /// Open a window; only applies in `Ready`
    pub fn session_started(&mut self, session_id: &str, now: Instant) -> bool {
        if self.phase() != AgentPhase::Ready {
            return false;
        }
        self.probes.start();
        self.session = Some(OpenSession {
            id: session_id.to_string(),
            last_activity: now,
        });
        true
    }

    /// Drop the open window
    pub fn session_cancelled(&mut self) -> bool {
        if self.session.take().is_none() {
            return false;
        }
        self.probes.cancel();
        true
    }

    /// Append records to the open window
    pub fn probe_part(&mut self, records: Vec<ProbeRecord>, now: Instant) -> bool {
        let Some(session) = &mut self.session else {
            return false;
        };
        session.last_activity = now;
        for record in records {
            self.probes.put(record);
        }
        true
    }

    /// Close the window and hand out its records
    pub fn session_finished(&mut self) -> Option<Vec<ProbeRecord>> {
        self.session.take()?;
        Some(self.probes.stop())
    }

    /// When the open session goes stale under `timeout`
    #[must_use]
    pub fn idle_deadline(&self, timeout: Duration) -> Option<Instant> {
        self.session.as_ref().map(|s| s.last_activity + timeout)
    }

    /// Abandon a session idle for at least `timeout`; returns its id
    pub fn abandon_if_idle(&mut self, now: Instant, timeout: Duration) -> Option<String> {
        let deadline = self.idle_deadline(timeout)?;
        if now < deadline {
            return None;
        }
        let session = self.session.take()?;
        self.probes.cancel();
        Some(session.id)
    }
}
