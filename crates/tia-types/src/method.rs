//! Structural method identity and coverage keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// Method identity within a build
///
/// Stable across builds only while owner, name and descriptor are unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    /// Owning unit (`com/acme/Owner`)
    pub owner: String,
    /// Method name
    pub name: String,
    /// JVM descriptor (`(I)V`)
    pub desc: String,
}

impl Method {
    /// Create method identity
    #[inline]
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
        }
    }

    /// Fully qualified signature (`com/acme/Owner.find(I)V`)
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}.{}{}", self.owner, self.name, self.desc)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.desc)
    }
}

/// Package part of a unit name (`com/acme` for `com/acme/Owner`)
#[must_use]
pub fn package_of(unit_name: &str) -> &str {
    unit_name.rsplit_once('/').map_or("", |(package, _)| package)
}

/// Simple part of a unit name (`Owner` for `com/acme/Owner`)
#[must_use]
pub fn simple_name(unit_name: &str) -> &str {
    unit_name.rsplit_once('/').map_or(unit_name, |(_, name)| name)
}

/// Stable identifier of a package, class or method
///
/// The `id` is derived from the element's qualified name so the same element
/// gets the same key in every computation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageKey {
    /// Hash of the qualified name
    pub id: String,
    /// Package path
    pub package_name: String,
    /// Class path, for class and method keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Method name, for method keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
}

impl CoverageKey {
    /// Key of a package
    #[must_use]
    pub fn package(package_name: &str) -> Self {
        Self {
            id: key_id(package_name),
            package_name: package_name.to_string(),
            class_name: None,
            method_name: None,
        }
    }

    /// Key of a class
    #[must_use]
    pub fn class(class_name: &str) -> Self {
        Self {
            id: key_id(class_name),
            package_name: package_of(class_name).to_string(),
            class_name: Some(class_name.to_string()),
            method_name: None,
        }
    }

    /// Key of a method
    #[must_use]
    pub fn method(method: &Method) -> Self {
        Self {
            id: key_id(&method.qualified()),
            package_name: package_of(&method.owner).to_string(),
            class_name: Some(method.owner.clone()),
            method_name: Some(method.name.clone()),
        }
    }
}

fn key_id(qualified: &str) -> String {
    let hash = blake3::hash(qualified.as_bytes());
    hex::encode(&hash.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_and_simple_names() {
        assert_eq!(package_of("com/acme/Owner"), "com/acme");
        assert_eq!(simple_name("com/acme/Owner"), "Owner");
        assert_eq!(package_of("Owner"), "");
        assert_eq!(simple_name("Owner"), "Owner");
    }

    #[test]
    fn coverage_key_is_stable() {
        let m = Method::new("com/acme/Owner", "find", "(I)V");
        assert_eq!(CoverageKey::method(&m), CoverageKey::method(&m.clone()));
        assert_eq!(CoverageKey::method(&m).id.len(), 16);
    }

    #[test]
    fn coverage_keys_differ_by_level() {
        let package = CoverageKey::package("com/acme");
        let class = CoverageKey::class("com/acme/Owner");
        let method = CoverageKey::method(&Method::new("com/acme/Owner", "find", "(I)V"));

        assert_ne!(package.id, class.id);
        assert_ne!(class.id, method.id);
        assert_eq!(class.package_name, "com/acme");
        assert_eq!(method.method_name.as_deref(), Some("find"));
    }

    #[test]
    fn method_identity_includes_descriptor() {
        let a = Method::new("a/B", "run", "()V");
        let b = Method::new("a/B", "run", "(I)V");
        assert_ne!(a, b);
        assert_eq!(a.qualified(), "a/B.run()V");
    }
}
