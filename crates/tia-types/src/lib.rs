//! TIA Types - shared data model
//!
//! Types exchanged between the agent-facing protocol, the analysis layer
//! and the session engine:
//! - Agent identity and build versions
//! - Probe records and test types
//! - Structural method identity and coverage keys
//! - Scopes and their storage addresses
//! - Protocol events, actions and result fragments

#![warn(unreachable_pub)]

pub mod descriptor;
pub mod ids;
pub mod method;
pub mod probe;
pub mod protocol;
pub mod report;
pub mod scope;

pub use descriptor::declaration;
pub use ids::{AgentId, AgentInfo};
pub use method::{package_of, simple_name, CoverageKey, Method};
pub use probe::{ProbeRecord, TestType};
pub use protocol::{Action, CoverageMessage, SessionEvent};
pub use report::{
    AssociatedTests, ClassCoverage, CoverageBlock, GatheringState, MethodCoverage,
    NewCoverageBlock, NewMethodCoverage, PackageCoverage, TestTypeSummary, TestUsage, Trend,
};
pub use scope::{KeyKind, Scope, StorageKey, StoredValue, DEFAULT_SCOPE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
