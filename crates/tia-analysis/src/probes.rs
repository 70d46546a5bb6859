//! Merged view of probe records for aggregation
//!
//! Records for the same `(unit, id)` and bitmap length are OR-merged: a
//! probe hit by any record is hit. Putting the same record twice is a
//! no-op. Bitmaps of different lengths never mix, so a record taken
//! against another version of a unit leaves the others intact.

use std::collections::BTreeMap;
use tia_types::ProbeRecord;

/// Probe bitmaps merged per unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeIndex {
    bitmaps: BTreeMap<String, BTreeMap<(i64, usize), Vec<bool>>>,
}

impl ProbeIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every record
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ProbeRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.put(record);
        }
        index
    }

    /// Merge one record
    pub fn put(&mut self, record: &ProbeRecord) {
        let len = record.probes.len();
        let slot = self
            .bitmaps
            .entry(record.unit_name.clone())
            .or_default()
            .entry((record.id, len))
            .or_insert_with(|| vec![false; len]);
        or_into(slot, &record.probes);
    }

    /// Bitmap of a unit, OR-merged across ids over bitmaps of `probe_count` bits
    ///
    /// `None` when the unit has no bitmap of that length.
    #[must_use]
    pub fn bitmap(&self, unit_name: &str, probe_count: usize) -> Option<Vec<bool>> {
        let mut merged: Option<Vec<bool>> = None;
        for bits in self.bitmaps(unit_name).filter(|b| b.len() == probe_count) {
            or_into(merged.get_or_insert_with(|| vec![false; probe_count]), bits);
        }
        merged
    }

    /// Every stored bitmap of a unit, one per `(id, length)`
    pub fn bitmaps<'a>(&'a self, unit_name: &str) -> impl Iterator<Item = &'a [bool]> + 'a {
        self.bitmaps
            .get(unit_name)
            .into_iter()
            .flat_map(|by_id| by_id.values().map(Vec::as_slice))
    }

    /// At least one record for the unit
    #[inline]
    #[must_use]
    pub fn contains(&self, unit_name: &str) -> bool {
        self.bitmaps.contains_key(unit_name)
    }

    /// Units with at least one record
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.bitmaps.keys().map(String::as_str)
    }

    /// Number of units with records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    /// No records indexed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }
}

fn or_into(target: &mut [bool], bits: &[bool]) {
    for (slot, bit) in target.iter_mut().zip(bits) {
        *slot |= *bit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn records_for_same_unit_are_or_merged() {
        let index = ProbeIndex::from_records(&[
            ProbeRecord::new(1, "a/B", vec![true, false, false]),
            ProbeRecord::new(1, "a/B", vec![false, false, true]),
            ProbeRecord::new(2, "a/B", vec![false, true, false]),
        ]);

        assert_eq!(index.bitmap("a/B", 3), Some(vec![true, true, true]));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn bitmaps_of_other_lengths_stay_apart() {
        let index = ProbeIndex::from_records(&[
            ProbeRecord::new(1, "a/B", vec![true, false]),
            ProbeRecord::new(2, "a/B", vec![false, true, true]),
            ProbeRecord::new(1, "a/B", vec![false]),
        ]);

        assert_eq!(index.bitmap("a/B", 2), Some(vec![true, false]));
        assert_eq!(index.bitmap("a/B", 3), Some(vec![false, true, true]));
        assert_eq!(index.bitmap("a/B", 4), None);
        assert_eq!(index.bitmaps("a/B").count(), 3);
    }

    #[test]
    fn unknown_unit_has_no_bitmap() {
        let index = ProbeIndex::new();
        assert!(index.bitmap("a/B", 1).is_none());
        assert!(!index.contains("a/B"));
        assert!(index.is_empty());
    }

    proptest! {
        #[test]
        fn prop_put_is_idempotent(bits in proptest::collection::vec(any::<bool>(), 0..64)) {
            let record = ProbeRecord::new(9, "a/B", bits);
            let once = ProbeIndex::from_records([&record]);
            let twice = ProbeIndex::from_records([&record, &record]);
            prop_assert_eq!(once, twice);
        }
    }
}
