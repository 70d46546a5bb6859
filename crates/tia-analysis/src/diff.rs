//! New-method diff between two adjacent builds

use crate::bundle::BundleCoverage;
use crate::analyzer::Counter;
use std::collections::BTreeSet;
use tia_types::{declaration, CoverageKey, Method, NewCoverageBlock, NewMethodCoverage};

/// Coverage restricted to the methods a build introduced
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewCodeCoverage {
    /// Scalar summary
    pub block: NewCoverageBlock,
    /// Per-method breakdown
    pub methods: Vec<NewMethodCoverage>,
}

/// Structural method-set comparison between consecutive builds
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassDiffEngine;

impl ClassDiffEngine {
    /// Create diff engine
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Methods present in `current` but not in `previous`
    ///
    /// Compared by (owner, name, descriptor). Without a previous build
    /// nothing is new.
    #[must_use]
    pub fn new_methods(
        &self,
        current: &BTreeSet<Method>,
        previous: Option<&BTreeSet<Method>>,
    ) -> Vec<Method> {
        match previous {
            Some(previous) => current.difference(previous).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Filter an already computed bundle down to `new_methods`
    #[must_use]
    pub fn new_code_coverage(
        &self,
        new_methods: &[Method],
        bundle: &BundleCoverage,
    ) -> NewCodeCoverage {
        if new_methods.is_empty() {
            return NewCodeCoverage::default();
        }
        let wanted: BTreeSet<&Method> = new_methods.iter().collect();
        let matched: Vec<_> = bundle
            .methods()
            .filter(|node| wanted.contains(&node.method))
            .collect();

        let instructions: Counter = matched.iter().map(|node| node.instructions).sum();
        let block = NewCoverageBlock {
            methods_count: matched.len(),
            methods_covered: matched
                .iter()
                .filter(|node| node.instructions.is_covered())
                .count(),
            coverage: instructions.ratio(),
        };

        let methods = matched
            .into_iter()
            .map(|node| NewMethodCoverage {
                id: CoverageKey::method(&node.method).id,
                owner_class: node.method.owner.clone(),
                name: node.method.name.clone(),
                desc: node.method.desc.clone(),
                decl: declaration(&node.method.desc),
                coverage: node.instructions.ratio(),
            })
            .collect();

        NewCodeCoverage { block, methods }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::UnitBytes;
    use crate::bundle::Selection;
    use crate::manifest::{ManifestAnalyzer, UnitManifest};
    use crate::probes::ProbeIndex;
    use pretty_assertions::assert_eq;
    use tia_types::ProbeRecord;

    fn set(methods: &[&str]) -> BTreeSet<Method> {
        methods.iter().map(|m| Method::new("a/X", *m, "()V")).collect()
    }

    #[test]
    fn new_methods_is_set_difference() {
        let diff = ClassDiffEngine::new().new_methods(&set(&["a", "b", "c"]), Some(&set(&["a", "b"])));
        assert_eq!(diff, vec![Method::new("a/X", "c", "()V")]);
    }

    #[test]
    fn descriptor_change_is_a_new_method() {
        let previous: BTreeSet<_> = [Method::new("a/X", "a", "()V")].into();
        let current: BTreeSet<_> = [Method::new("a/X", "a", "(I)V")].into();
        assert_eq!(ClassDiffEngine::new().new_methods(&current, Some(&previous)).len(), 1);
    }

    #[test]
    fn no_previous_build_means_nothing_new() {
        assert!(ClassDiffEngine::new().new_methods(&set(&["a"]), None).is_empty());
    }

    #[test]
    fn new_code_coverage_filters_bundle() {
        let mut units = UnitBytes::new();
        units.insert(
            "a/X".into(),
            UnitManifest::new()
                .with_method("a", "()V", vec![5])
                .with_method("c", "()V", vec![2, 2])
                .to_bytes(),
        );
        let index = ProbeIndex::from_records(&[ProbeRecord::new(1, "a/X", vec![true, true, false])]);
        let bundle =
            BundleCoverage::analyze(&ManifestAnalyzer, &units, &index, Selection::AllUnits).unwrap();

        let new = ClassDiffEngine::new().new_code_coverage(&[Method::new("a/X", "c", "()V")], &bundle);

        assert_eq!(
            new.block,
            NewCoverageBlock {
                methods_count: 1,
                methods_covered: 1,
                coverage: Some(0.5),
            }
        );
        assert_eq!(new.methods[0].name, "c");
        assert_eq!(new.methods[0].decl, "(): void");
    }

    #[test]
    fn empty_new_set_has_absent_ratio() {
        let new = ClassDiffEngine::new().new_code_coverage(&[], &BundleCoverage::default());
        assert!(new.block.is_empty());
        assert_eq!(new.block.coverage, None);
    }
}
