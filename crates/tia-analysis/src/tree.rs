//! Package → class → method coverage tree

use crate::association::AssociationMap;
use crate::bundle::{BundleCoverage, ClassNode};
use tia_types::{
    declaration, simple_name, ClassCoverage, CoverageKey, MethodCoverage, PackageCoverage,
};

/// Coverage tree of a bundle, annotated with associated-test counts
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn package_tree(bundle: &BundleCoverage, associations: &AssociationMap) -> Vec<PackageCoverage> {
    bundle
        .packages
        .iter()
        .map(|package| {
            let key = CoverageKey::package(&package.name);
            let classes = package.class_counter();
            let methods = package.method_counter();
            PackageCoverage {
                assoc_tests_count: associations.count(&key),
                id: key.id,
                name: package.name.clone(),
                coverage: package.instructions().ratio(),
                total_classes_count: classes.total as usize,
                covered_classes_count: classes.covered as usize,
                total_methods_count: methods.total as usize,
                covered_methods_count: methods.covered as usize,
                classes: package
                    .classes
                    .iter()
                    .map(|class| class_coverage(class, associations))
                    .collect(),
            }
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
fn class_coverage(class: &ClassNode, associations: &AssociationMap) -> ClassCoverage {
    let key = CoverageKey::class(&class.name);
    let methods = class.method_counter();
    ClassCoverage {
        assoc_tests_count: associations.count(&key),
        id: key.id,
        name: simple_name(&class.name).to_string(),
        path: class.name.clone(),
        coverage: class.instructions().ratio(),
        total_methods_count: methods.total as usize,
        covered_methods_count: methods.covered as usize,
        methods: class
            .methods
            .iter()
            .map(|node| {
                let key = CoverageKey::method(&node.method);
                MethodCoverage {
                    assoc_tests_count: associations.count(&key),
                    id: key.id,
                    name: node.method.name.clone(),
                    desc: node.method.desc.clone(),
                    decl: declaration(&node.method.desc),
                    coverage: node.instructions.ratio(),
                    covered_count: node.instructions.covered,
                    total_count: node.instructions.total,
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::UnitBytes;
    use crate::association::AssociationMapper;
    use crate::bundle::Selection;
    use crate::manifest::{ManifestAnalyzer, UnitManifest};
    use crate::probes::ProbeIndex;
    use tia_types::{ProbeRecord, TestType};

    #[test]
    fn tree_mirrors_bundle_and_counts_tests() {
        let mut units = UnitBytes::new();
        units.insert(
            "pets/Owner".into(),
            UnitManifest::new()
                .with_method("name", "()Ljava/lang/String;", vec![2])
                .with_method("age", "()I", vec![2])
                .to_bytes(),
        );
        let records = vec![ProbeRecord::new(1, "pets/Owner", vec![true, false]).with_test("T", TestType::Auto)];
        let bundle = BundleCoverage::analyze(
            &ManifestAnalyzer,
            &units,
            &ProbeIndex::from_records(&records),
            Selection::AllUnits,
        )
        .unwrap();
        let associations = AssociationMapper::new(&ManifestAnalyzer, &units).map(&records);

        let tree = package_tree(&bundle, &associations);

        assert_eq!(tree.len(), 1);
        let package = &tree[0];
        assert_eq!(package.name, "pets");
        assert_eq!(package.assoc_tests_count, Some(1));
        assert_eq!(package.covered_methods_count, 1);

        let class = &package.classes[0];
        assert_eq!(class.name, "Owner");
        assert_eq!(class.path, "pets/Owner");
        assert_eq!(class.coverage, Some(0.5));

        assert_eq!(class.methods[0].decl, "(): String");
        assert_eq!(class.methods[0].assoc_tests_count, Some(1));
        assert_eq!(class.methods[1].assoc_tests_count, None);
        assert_eq!(class.methods[1].total_count, 2);
    }
}
