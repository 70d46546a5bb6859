//! TIA Engine - per-agent coverage session engine
//!
//! Consumes the ordered session protocol of many agents and turns it into
//! coverage result fragments:
//! - One actor per agent applies its events in arrival order
//! - Build snapshots are frozen only after full structural ingestion
//! - Probe windows merge into named, persisted scopes
//! - Coverage computation runs off the ingestion path
//! - Fragments are delivered independently with bounded retries
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tia_engine::{Controller, EngineConfig, MemorySender};
//! use tia_analysis::ManifestAnalyzer;
//! use tia_types::{AgentInfo, SessionEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = Controller::new(
//!     Arc::new(MemorySender::new()),
//!     Arc::new(ManifestAnalyzer::new()),
//!     EngineConfig::default(),
//! )?;
//! let agent = AgentInfo::new("petclinic", "1.0");
//! controller
//!     .process_event(&agent, SessionEvent::SessionStarted { session_id: "s1".into() })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod classes;
pub mod config;
pub mod controller;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod probe_store;
pub mod registry;
pub mod retry;
pub mod scope;
pub mod sender;
pub mod state;
pub mod worker;

pub use classes::{AgentData, ClassesBuilder, ClassesData, PreviousBuild};
pub use config::{BaselinePolicy, EngineConfig};
pub use controller::Controller;
pub use delivery::{destination, Publisher, ReportLevel};
pub use error::{EngineError, SenderError};
pub use logging::{init_test_tracing, init_tracing};
pub use probe_store::ProbeStore;
pub use registry::{AgentHandle, AgentRegistry};
pub use retry::RetryPolicy;
pub use scope::{ScopeManager, ScopeRepository};
pub use sender::{Delivery, MemorySender, Sender};
pub use state::{AgentPhase, AgentState};
pub use worker::{AgentCommand, DispatchOutcome, EngineContext};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::{
        Action, AgentInfo, Controller, DispatchOutcome, EngineConfig, MemorySender, Sender,
        SessionEvent,
    };
}

pub use tia_types::{Action, AgentInfo, SessionEvent};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
