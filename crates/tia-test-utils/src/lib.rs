//! Testing utilities for TIA workspace
//!
//! Shared fixtures: manifest units, probe records and protocol sequences.

#![allow(missing_docs)]

use tia_analysis::{UnitBytes, UnitManifest};
use tia_types::{Action, AgentInfo, ProbeRecord, SessionEvent, TestType};

/// Instructions behind every probe of [`unit`]
pub const INSTRUCTIONS_PER_PROBE: u64 = 2;

/// Manifest unit with one `()V` method per name, one probe each
pub fn unit(methods: &[&str]) -> Vec<u8> {
    methods
        .iter()
        .fold(UnitManifest::new(), |manifest, name| {
            manifest.with_method(*name, "()V", vec![INSTRUCTIONS_PER_PROBE])
        })
        .to_bytes()
}

/// Unit map from `(name, methods)` pairs
pub fn units(entries: &[(&str, &[&str])]) -> UnitBytes {
    entries
        .iter()
        .map(|(name, methods)| ((*name).to_string(), unit(methods)))
        .collect()
}

/// Untagged record
pub fn record(unit_name: &str, probes: &[bool]) -> ProbeRecord {
    ProbeRecord::new(content_id(unit_name), unit_name, probes.to_vec())
}

/// Record of an automated test
pub fn test_record(unit_name: &str, probes: &[bool], test: &str) -> ProbeRecord {
    record(unit_name, probes).with_test(test, TestType::Auto)
}

/// Stable id for a unit name
pub fn content_id(unit_name: &str) -> i64 {
    unit_name
        .bytes()
        .fold(17_i64, |acc, b| acc.wrapping_mul(31).wrapping_add(i64::from(b)))
}

pub fn agent(id: &str, build: &str) -> AgentInfo {
    AgentInfo::new(id, build)
}

pub fn init(build: &str) -> SessionEvent {
    SessionEvent::Init {
        build_version: build.to_string(),
        message: String::new(),
        units_count: 0,
    }
}

pub fn add_unit(name: &str, methods: &[&str]) -> SessionEvent {
    SessionEvent::AddUnit {
        name: name.to_string(),
        bytes: unit(methods),
    }
}

pub fn initialized(expected_units: usize) -> SessionEvent {
    SessionEvent::Initialized {
        message: String::new(),
        expected_units,
    }
}

pub fn started(session_id: &str) -> SessionEvent {
    SessionEvent::SessionStarted {
        session_id: session_id.to_string(),
    }
}

pub fn probe_part(records: Vec<ProbeRecord>) -> SessionEvent {
    SessionEvent::ProbePart { records }
}

pub fn cancelled(session_id: &str) -> SessionEvent {
    SessionEvent::SessionCancelled {
        session_id: session_id.to_string(),
    }
}

pub fn finished(session_id: &str) -> SessionEvent {
    SessionEvent::SessionFinished {
        session_id: session_id.to_string(),
    }
}

pub fn create_scope(name: &str) -> Action {
    Action::CreateScope {
        scope_name: name.to_string(),
    }
}

pub fn build_coverage(build: &str) -> Action {
    Action::BuildCoverage {
        build_version: build.to_string(),
    }
}

pub fn toggle_scope(name: &str, accounted: bool) -> Action {
    Action::ToggleScope {
        scope_name: name.to_string(),
        accounted,
    }
}

/// `Init`, one `AddUnit` per entry, then `Initialized` expecting all of them
pub fn load_build(build: &str, entries: &[(&str, &[&str])]) -> Vec<SessionEvent> {
    let mut events = vec![init(build)];
    events.extend(entries.iter().map(|(name, methods)| add_unit(name, methods)));
    events.push(initialized(entries.len()));
    events
}

/// `SessionStarted`, one `ProbePart` per record, then `SessionFinished`
pub fn session(session_id: &str, records: Vec<ProbeRecord>) -> Vec<SessionEvent> {
    let mut events = vec![started(session_id)];
    events.extend(records.into_iter().map(|r| probe_part(vec![r])));
    events.push(finished(session_id));
    events
}
