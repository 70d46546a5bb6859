//! Accumulation window for one collection session
//!
//! Records are keyed by unit, content id and test name, so bitmaps of
//! different tests for the same unit live side by side; a later record
//! for the same key replaces the earlier one. Nothing is accepted while
//! the window is closed.

use indexmap::IndexMap;
use tia_types::ProbeRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProbeKey {
    unit_name: String,
    id: i64,
    test_name: Option<String>,
}

impl ProbeKey {
    fn of(record: &ProbeRecord) -> Self {
        Self {
            unit_name: record.unit_name.clone(),
            id: record.id,
            test_name: record.test_name.clone(),
        }
    }
}

/// Keyed probe window
#[derive(Debug, Default)]
pub struct ProbeStore {
    open: bool,
    records: IndexMap<ProbeKey, ProbeRecord>,
}

impl ProbeStore {
    /// Create closed store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh window
    pub fn start(&mut self) {
        self.records.clear();
        self.open = true;
    }

    /// Insert or overwrite a record; `false` if the window is closed
    pub fn put(&mut self, record: ProbeRecord) -> bool {
        if !self.open {
            return false;
        }
        self.records.insert(ProbeKey::of(&record), record);
        true
    }

    /// Close the window and hand out its records in first-arrival order
    pub fn stop(&mut self) -> Vec<ProbeRecord> {
        self.open = false;
        self.records.drain(..).map(|(_, record)| record).collect()
    }

    /// Close the window and drop its records
    pub fn cancel(&mut self) {
        self.open = false;
        self.records.clear();
    }

    /// Window currently open
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Records in the window
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Window holds no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
