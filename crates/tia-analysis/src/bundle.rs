//! Bundle coverage at method/class/package granularity

use crate::analyzer::{Counter, StructuralAnalyzer, UnitAnalysis, UnitBytes};
use crate::error::AnalysisError;
use crate::probes::ProbeIndex;
use std::collections::BTreeMap;
use tia_types::{package_of, Method};

/// Which units enter a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every unit of the build
    AllUnits,
    /// Only units that have probe data in the index
    TouchedUnits,
}

/// Method leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNode {
    /// Structural identity
    pub method: Method,
    /// Instruction counter
    pub instructions: Counter,
}

/// Class node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNode {
    /// Class path
    pub name: String,
    /// Methods in declaration order
    pub methods: Vec<MethodNode>,
}

impl ClassNode {
    pub(crate) fn from_analysis(unit: UnitAnalysis) -> Self {
        let methods = unit
            .methods
            .into_iter()
            .map(|m| MethodNode {
                method: Method::new(unit.name.clone(), m.name, m.desc),
                instructions: m.instructions,
            })
            .collect();
        Self {
            name: unit.name,
            methods,
        }
    }

    /// Instruction counter of the class
    #[must_use]
    pub fn instructions(&self) -> Counter {
        self.methods.iter().map(|m| m.instructions).sum()
    }

    /// Methods with a covered instruction / all methods
    #[must_use]
    pub fn method_counter(&self) -> Counter {
        method_counter(self.methods.iter())
    }

    /// At least one covered method
    #[inline]
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.methods.iter().any(|m| m.instructions.is_covered())
    }
}

/// Package node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    /// Package path
    pub name: String,
    /// Classes ordered by name
    pub classes: Vec<ClassNode>,
}

impl PackageNode {
    /// Instruction counter of the package
    #[must_use]
    pub fn instructions(&self) -> Counter {
        self.classes.iter().map(ClassNode::instructions).sum()
    }

    /// Methods with a covered instruction / all methods
    #[must_use]
    pub fn method_counter(&self) -> Counter {
        method_counter(self.classes.iter().flat_map(|c| c.methods.iter()))
    }

    /// Covered classes / all classes
    #[must_use]
    pub fn class_counter(&self) -> Counter {
        class_counter(self.classes.iter())
    }
}

/// Aggregate coverage of a set of units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleCoverage {
    /// Packages ordered by name
    pub packages: Vec<PackageNode>,
}

impl BundleCoverage {
    /// Analyze units against the merged probes of `index`
    ///
    /// Only bitmaps whose length matches the unit's probe count take part;
    /// the others are logged and skipped.
    ///
    /// # Errors
    /// Returns `AnalysisError::MalformedUnit` if a unit's bytes are unusable
    pub fn analyze(
        analyzer: &dyn StructuralAnalyzer,
        units: &UnitBytes,
        index: &ProbeIndex,
        selection: Selection,
    ) -> Result<Self, AnalysisError> {
        let mut packages: BTreeMap<String, Vec<ClassNode>> = BTreeMap::new();

        for (name, bytes) in units {
            if selection == Selection::TouchedUnits && !index.contains(name) {
                continue;
            }
            let unit = analyze_indexed(analyzer, name, bytes, index)?;
            packages
                .entry(package_of(name).to_string())
                .or_default()
                .push(ClassNode::from_analysis(unit));
        }

        Ok(Self {
            packages: packages
                .into_iter()
                .map(|(name, classes)| PackageNode { name, classes })
                .collect(),
        })
    }

    /// Instruction counter of the bundle
    #[must_use]
    pub fn instructions(&self) -> Counter {
        self.packages.iter().map(PackageNode::instructions).sum()
    }

    /// Methods with a covered instruction / all methods
    #[must_use]
    pub fn method_counter(&self) -> Counter {
        method_counter(self.methods())
    }

    /// Covered classes / all classes
    #[must_use]
    pub fn class_counter(&self) -> Counter {
        class_counter(self.packages.iter().flat_map(|p| p.classes.iter()))
    }

    /// Covered / total instructions
    #[inline]
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        self.instructions().ratio()
    }

    /// Every method leaf
    pub fn methods(&self) -> impl Iterator<Item = &MethodNode> {
        self.packages
            .iter()
            .flat_map(|p| p.classes.iter())
            .flat_map(|c| c.methods.iter())
    }
}

/// Analyze one unit, dropping a bitmap the analyzer rejects
pub(crate) fn analyze_unit(
    analyzer: &dyn StructuralAnalyzer,
    name: &str,
    bytes: &[u8],
    bitmap: Option<&[bool]>,
) -> Result<UnitAnalysis, AnalysisError> {
    match analyzer.analyze(name, bytes, bitmap) {
        Err(err @ AnalysisError::ProbeCountMismatch { .. }) => {
            tracing::warn!(unit = name, error = %err, "ignoring incompatible probe data");
            analyzer.analyze(name, bytes, None)
        }
        other => other,
    }
}

/// Analyze one unit against the bitmaps of `index` that fit it
fn analyze_indexed(
    analyzer: &dyn StructuralAnalyzer,
    name: &str,
    bytes: &[u8],
    index: &ProbeIndex,
) -> Result<UnitAnalysis, AnalysisError> {
    let Some(guess) = index.bitmaps(name).map(<[bool]>::len).max() else {
        return analyzer.analyze(name, bytes, None);
    };
    match analyzer.analyze(name, bytes, index.bitmap(name, guess).as_deref()) {
        Err(AnalysisError::ProbeCountMismatch { expected, .. }) => {
            let skipped = index.bitmaps(name).filter(|b| b.len() != expected).count();
            tracing::warn!(unit = name, expected, skipped, "ignoring probe data of another length");
            analyze_unit(analyzer, name, bytes, index.bitmap(name, expected).as_deref())
        }
        other => other,
    }
}

fn method_counter<'a>(methods: impl Iterator<Item = &'a MethodNode>) -> Counter {
    methods.fold(Counter::default(), |acc, m| {
        acc + Counter::new(u64::from(m.instructions.is_covered()), 1)
    })
}

fn class_counter<'a>(classes: impl Iterator<Item = &'a ClassNode>) -> Counter {
    classes.fold(Counter::default(), |acc, c| {
        acc + Counter::new(u64::from(c.is_covered()), 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestAnalyzer, UnitManifest};
    use proptest::prelude::*;
    use tia_types::ProbeRecord;

    fn units() -> UnitBytes {
        let mut units = UnitBytes::new();
        units.insert(
            "shop/Cart".into(),
            UnitManifest::new()
                .with_method("add", "(I)V", vec![4])
                .with_method("total", "()J", vec![6])
                .to_bytes(),
        );
        units.insert(
            "shop/pay/Card".into(),
            UnitManifest::new().with_method("charge", "()Z", vec![10]).to_bytes(),
        );
        units
    }

    #[test]
    fn groups_units_into_packages() {
        let bundle = BundleCoverage::analyze(
            &ManifestAnalyzer,
            &units(),
            &ProbeIndex::new(),
            Selection::AllUnits,
        )
        .unwrap();

        let names: Vec<_> = bundle.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["shop", "shop/pay"]);
        assert_eq!(bundle.class_counter(), Counter::new(0, 2));
        assert_eq!(bundle.method_counter(), Counter::new(0, 3));
        assert_eq!(bundle.ratio(), Some(0.0));
    }

    #[test]
    fn counts_covered_methods_and_classes() {
        let index = ProbeIndex::from_records(&[ProbeRecord::new(1, "shop/Cart", vec![true, false])]);
        let bundle =
            BundleCoverage::analyze(&ManifestAnalyzer, &units(), &index, Selection::AllUnits)
                .unwrap();

        assert_eq!(bundle.instructions(), Counter::new(4, 20));
        assert_eq!(bundle.method_counter(), Counter::new(1, 3));
        assert_eq!(bundle.class_counter(), Counter::new(1, 2));
    }

    #[test]
    fn touched_selection_skips_units_without_data() {
        let index = ProbeIndex::from_records(&[ProbeRecord::new(1, "shop/Cart", vec![true, true])]);
        let bundle =
            BundleCoverage::analyze(&ManifestAnalyzer, &units(), &index, Selection::TouchedUnits)
                .unwrap();

        assert_eq!(bundle.packages.len(), 1);
        assert_eq!(bundle.ratio(), Some(1.0));
    }

    #[test]
    fn empty_build_has_absent_ratio() {
        let bundle = BundleCoverage::analyze(
            &ManifestAnalyzer,
            &UnitBytes::new(),
            &ProbeIndex::new(),
            Selection::AllUnits,
        )
        .unwrap();
        assert_eq!(bundle.ratio(), None);
    }

    #[test]
    fn mismatching_record_leaves_valid_hits_alone() {
        let good = ProbeRecord::new(1, "shop/Cart", vec![true, true]);
        let stale = ProbeRecord::new(2, "shop/Cart", vec![false, false, false]);

        let alone = ProbeIndex::from_records([&good]);
        let mixed = ProbeIndex::from_records([&good, &stale]);
        let coverage = |index: &ProbeIndex| {
            BundleCoverage::analyze(&ManifestAnalyzer, &units(), index, Selection::TouchedUnits)
                .unwrap()
                .instructions()
        };

        assert_eq!(coverage(&alone), Counter::new(10, 10));
        assert_eq!(coverage(&mixed), Counter::new(10, 10));
    }

    #[test]
    fn incompatible_bitmap_is_ignored() {
        let index = ProbeIndex::from_records(&[ProbeRecord::new(1, "shop/Cart", vec![true])]);
        let bundle =
            BundleCoverage::analyze(&ManifestAnalyzer, &units(), &index, Selection::AllUnits)
                .unwrap();
        assert_eq!(bundle.instructions().covered, 0);
    }

    proptest! {
        #[test]
        fn prop_ratio_is_bounded(a in any::<bool>(), b in any::<bool>(), c in any::<bool>()) {
            let index = ProbeIndex::from_records(&[
                ProbeRecord::new(1, "shop/Cart", vec![a, b]),
                ProbeRecord::new(2, "shop/pay/Card", vec![c]),
            ]);
            let bundle = BundleCoverage::analyze(&ManifestAnalyzer, &units(), &index, Selection::AllUnits).unwrap();
            let ratio = bundle.ratio().unwrap();
            prop_assert!((0.0..=1.0).contains(&ratio));
        }
    }
}
