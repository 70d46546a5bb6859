//! Session protocol events and out-of-band actions
//!
//! Valid event order per build: `Init`, repeated `AddUnit`, `Initialized`,
//! then any interleaving of `SessionStarted`, `ProbePart` and
//! `SessionCancelled` | `SessionFinished`.

use crate::ids::AgentInfo;
use crate::probe::ProbeRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structural or session event sent by an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A build starts loading
    Init {
        /// Build being loaded
        build_version: String,
        /// Free-form agent message
        message: String,
        /// Number of units the agent announced
        units_count: usize,
    },
    /// Structural bytes of one compiled unit
    AddUnit {
        /// Qualified unit name
        name: String,
        /// Raw structural bytes
        bytes: Vec<u8>,
    },
    /// All units of the build were sent
    Initialized {
        /// Free-form agent message
        message: String,
        /// Number of units that must have been ingested; 0 skips the check
        expected_units: usize,
    },
    /// A collection session opened
    SessionStarted {
        /// Agent-side session id
        session_id: String,
    },
    /// Probe records of the open session
    ProbePart {
        /// Records in emission order
        records: Vec<ProbeRecord>,
    },
    /// The open session was abandoned
    SessionCancelled {
        /// Agent-side session id
        session_id: String,
    },
    /// The open session completed
    SessionFinished {
        /// Agent-side session id
        session_id: String,
    },
}

impl SessionEvent {
    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::AddUnit { .. } => "add_unit",
            Self::Initialized { .. } => "initialized",
            Self::SessionStarted { .. } => "session_started",
            Self::ProbePart { .. } => "probe_part",
            Self::SessionCancelled { .. } => "session_cancelled",
            Self::SessionFinished { .. } => "session_finished",
        }
    }
}

/// Out-of-band command issued by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Switch the active scope
    #[serde(rename_all = "camelCase")]
    CreateScope {
        /// New scope name
        scope_name: String,
    },
    /// Switch back to the default scope
    DropScope,
    /// Report coverage over every accounted scope of a build
    #[serde(rename_all = "camelCase")]
    BuildCoverage {
        /// Build to report on
        build_version: String,
    },
    /// Include or exclude a scope from build-level totals
    #[serde(rename_all = "camelCase")]
    ToggleScope {
        /// Scope to update
        scope_name: String,
        /// New accounting flag
        accounted: bool,
    },
}

/// Raw agent message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMessage {
    /// Event kind (`INIT`, `CLASS_BYTES`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific payload
    #[serde(default)]
    pub data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitData {
    #[serde(default)]
    build_version: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default, alias = "classesCount")]
    units_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitData {
    #[serde(alias = "className")]
    name: String,
    bytes: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InitializedData {
    Message(String),
    #[serde(rename_all = "camelCase")]
    Detailed {
        #[serde(default)]
        message: String,
        #[serde(default, alias = "classesCount")]
        expected_units: usize,
    },
}

impl CoverageMessage {
    /// Create raw message
    #[must_use]
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Decode into a typed event
    ///
    /// Returns `Ok(None)` for kinds this engine does not know. `Init`
    /// without an explicit build version uses the agent's current one.
    ///
    /// # Errors
    /// Returns the payload decoding error for a known kind with a malformed
    /// payload.
    pub fn decode(self, agent: &AgentInfo) -> Result<Option<SessionEvent>, serde_json::Error> {
        let event = match self.kind.as_str() {
            "INIT" => {
                let data: InitData = serde_json::from_value(self.data)?;
                SessionEvent::Init {
                    build_version: data
                        .build_version
                        .unwrap_or_else(|| agent.build_version.clone()),
                    message: data.message,
                    units_count: data.units_count,
                }
            }
            "CLASS_BYTES" => {
                let data: UnitData = serde_json::from_value(self.data)?;
                SessionEvent::AddUnit {
                    name: data.name,
                    bytes: data.bytes,
                }
            }
            "INITIALIZED" => {
                let (message, expected_units) = match self.data {
                    Value::Null => (String::new(), 0),
                    data => match serde_json::from_value(data)? {
                        InitializedData::Message(message) => (message, 0),
                        InitializedData::Detailed {
                            message,
                            expected_units,
                        } => (message, expected_units),
                    },
                };
                SessionEvent::Initialized {
                    message,
                    expected_units,
                }
            }
            "SESSION_STARTED" => SessionEvent::SessionStarted {
                session_id: session_id(self.data),
            },
            "SESSION_CANCELLED" => SessionEvent::SessionCancelled {
                session_id: session_id(self.data),
            },
            "SESSION_FINISHED" => SessionEvent::SessionFinished {
                session_id: session_id(self.data),
            },
            "COVERAGE_DATA_PART" => SessionEvent::ProbePart {
                records: serde_json::from_value(self.data)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn session_id(data: Value) -> String {
    match data {
        Value::String(id) => id,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent() -> AgentInfo {
        AgentInfo::new("agent", "1.0")
    }

    #[test]
    fn init_falls_back_to_agent_build() {
        let event = CoverageMessage::new("INIT", json!({"message": "hi", "classesCount": 2}))
            .decode(&agent())
            .unwrap();

        assert_eq!(
            event,
            Some(SessionEvent::Init {
                build_version: "1.0".into(),
                message: "hi".into(),
                units_count: 2,
            })
        );
    }

    #[test]
    fn initialized_accepts_plain_message() {
        let event = CoverageMessage::new("INITIALIZED", json!("done"))
            .decode(&agent())
            .unwrap();
        assert_eq!(
            event,
            Some(SessionEvent::Initialized {
                message: "done".into(),
                expected_units: 0,
            })
        );
    }

    #[test]
    fn probe_part_decodes_records() {
        let event = CoverageMessage::new(
            "COVERAGE_DATA_PART",
            json!([{"id": 1, "className": "a/B", "probes": [true]}]),
        )
        .decode(&agent())
        .unwrap();

        match event {
            Some(SessionEvent::ProbePart { records }) => assert_eq!(records.len(), 1),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_none() {
        let event = CoverageMessage::new("SOMETHING_ELSE", Value::Null)
            .decode(&agent())
            .unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn malformed_payload_is_error() {
        let result = CoverageMessage::new("CLASS_BYTES", json!({"bytes": "oops"})).decode(&agent());
        assert!(result.is_err());
    }

    #[test]
    fn action_wire_shape() {
        let action: Action =
            serde_json::from_str(r#"{"type":"CREATE_SCOPE","payload":{"scopeName":"smoke"}}"#)
                .unwrap();
        assert_eq!(
            action,
            Action::CreateScope {
                scope_name: "smoke".into()
            }
        );

        let drop: Action = serde_json::from_str(r#"{"type":"DROP_SCOPE"}"#).unwrap();
        assert_eq!(drop, Action::DropScope);
    }
}
