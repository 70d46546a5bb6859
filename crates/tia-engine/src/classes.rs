//! Per-build structural snapshot
//!
//! An agent's build data moves through three shapes:
//! - [`AgentData::NoData`] before the first `Init`
//! - [`AgentData::Loading`] while units are streamed in
//! - [`AgentData::Ready`] once frozen into [`ClassesData`]
//!
//! Only the immediately previous build is retained, and only what the
//! new-method diff and trend memory need from it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tia_analysis::{ClassDiffEngine, Counter, StructuralAnalyzer, UnitBytes};
use tia_types::Method;

/// What survives of a replaced build
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousBuild {
    /// Build version
    pub build_version: String,
    /// Unit names of that build
    pub unit_names: BTreeSet<String>,
    /// Method set of that build
    pub methods: Arc<BTreeSet<Method>>,
    /// Last total ratio computed for that build
    pub last_ratio: Option<f64>,
}

/// Units streamed in for a build that is not frozen yet
#[derive(Debug, Clone, Default)]
pub struct ClassesBuilder {
    /// Build being loaded
    pub build_version: String,
    /// Units received so far
    pub units: UnitBytes,
    /// Build this one replaces
    pub previous: Option<PreviousBuild>,
}

impl ClassesBuilder {
    /// Empty buffer for a build
    #[must_use]
    pub fn new(build_version: impl Into<String>, previous: Option<PreviousBuild>) -> Self {
        Self {
            build_version: build_version.into(),
            units: UnitBytes::new(),
            previous,
        }
    }

    /// Add or replace a unit
    pub fn add_unit(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.units.insert(name.into(), bytes);
    }

    /// Number of units received
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// No unit received yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Freeze into a snapshot
    ///
    /// Units the analyzer cannot interpret are left out of the snapshot.
    #[must_use]
    pub fn freeze(self, analyzer: &dyn StructuralAnalyzer) -> ClassesData {
        let mut units = UnitBytes::new();
        let mut methods = BTreeSet::new();
        let mut unit_totals = BTreeMap::new();

        for (name, bytes) in self.units {
            match analyzer.analyze(&name, &bytes, None) {
                Ok(analysis) => {
                    let total: Counter = analysis.methods.iter().map(|m| m.instructions).sum();
                    methods.extend(analysis.method_identities());
                    unit_totals.insert(name.clone(), total);
                    units.insert(name, bytes);
                }
                Err(error) => {
                    tracing::warn!(unit = %name, %error, "skipping unreadable unit");
                }
            }
        }

        let unit_names: BTreeSet<String> = units.keys().cloned().collect();
        let changed = match &self.previous {
            Some(previous) => {
                previous.build_version != self.build_version || previous.unit_names != unit_names
            }
            None => true,
        };
        let new_methods = ClassDiffEngine::new()
            .new_methods(&methods, self.previous.as_ref().map(|p| p.methods.as_ref()));
        let last_ratio = self.previous.as_ref().and_then(|p| p.last_ratio);

        ClassesData {
            build_version: self.build_version,
            totals: unit_totals.values().copied().sum(),
            units: Arc::new(units),
            methods: Arc::new(methods),
            new_methods: Arc::from(new_methods),
            unit_totals,
            previous: self.previous,
            last_ratio,
            changed,
        }
    }
}

/// Frozen structural data of one build
#[derive(Debug, Clone)]
pub struct ClassesData {
    /// Build version
    pub build_version: String,
    /// Unit bytes, shared with computations in flight
    pub units: Arc<UnitBytes>,
    /// Every method of the build
    pub methods: Arc<BTreeSet<Method>>,
    /// Methods absent from the previous build
    pub new_methods: Arc<[Method]>,
    /// Instruction totals of the build
    pub totals: Counter,
    /// Instruction totals per unit
    pub unit_totals: BTreeMap<String, Counter>,
    /// Build this one replaced
    pub previous: Option<PreviousBuild>,
    /// Trend memory: last total ratio reported for this build
    pub last_ratio: Option<f64>,
    /// Structure differs from the previous build
    pub changed: bool,
}

impl ClassesData {
    /// Unit names of this build
    #[must_use]
    pub fn unit_names(&self) -> BTreeSet<String> {
        self.units.keys().cloned().collect()
    }

    /// What a successor build keeps of this one
    #[must_use]
    pub fn to_previous(&self) -> PreviousBuild {
        PreviousBuild {
            build_version: self.build_version.clone(),
            unit_names: self.unit_names(),
            methods: Arc::clone(&self.methods),
            last_ratio: self.last_ratio,
        }
    }
}

/// Structural data of an agent
#[derive(Debug, Clone, Default)]
pub enum AgentData {
    /// Nothing received yet
    #[default]
    NoData,
    /// Units being streamed in
    Loading(ClassesBuilder),
    /// Frozen build snapshot
    Ready(ClassesData),
}

impl AgentData {
    /// Build version, if any build was announced
    #[must_use]
    pub fn build_version(&self) -> Option<&str> {
        match self {
            Self::NoData => None,
            Self::Loading(builder) => Some(&builder.build_version),
            Self::Ready(data) => Some(&data.build_version),
        }
    }

    /// Frozen snapshot, if any
    #[inline]
    #[must_use]
    pub fn ready(&self) -> Option<&ClassesData> {
        match self {
            Self::Ready(data) => Some(data),
            Self::NoData | Self::Loading(_) => None,
        }
    }
}
