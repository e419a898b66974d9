use std::collections::BTreeMap;

use bpk_types::{BuildTarget, PackagePath};
use tracing::debug;

use crate::package::BuildPackage;

/// Result of package validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub path: PackagePath,
    pub rule_count: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific problem detected in a package record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub target: BuildTarget,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// The rule's target lives in a different package directory.
    TargetOutsidePackage,
    /// More than one distinct rule claims the same target.
    DuplicateTarget,
    /// The rule lists its own target as a dependency.
    SelfDependency,
}

/// Check the structural invariants of a package.
///
/// The codec never calls this; packages are transported as-is.
pub fn validate(package: &BuildPackage) -> ValidationReport {
    let mut violations = Vec::new();
    let mut seen: BTreeMap<&BuildTarget, usize> = BTreeMap::new();

    for rule in package.rules() {
        let target = rule.target();
        *seen.entry(target).or_default() += 1;

        let target_path = target.package_path();
        if &target_path != package.path() {
            violations.push(Violation {
                target: target.clone(),
                kind: ViolationKind::TargetOutsidePackage,
                description: format!(
                    "target is in package {:?}, expected {:?}",
                    target_path.as_str(),
                    package.path().as_str()
                ),
            });
        }

        if rule.depends_on(target) {
            violations.push(Violation {
                target: target.clone(),
                kind: ViolationKind::SelfDependency,
                description: "rule depends on itself".into(),
            });
        }
    }

    for (target, count) in seen {
        if count > 1 {
            violations.push(Violation {
                target: target.clone(),
                kind: ViolationKind::DuplicateTarget,
                description: format!("{count} rules declare this target"),
            });
        }
    }

    debug!(
        path = %package.path(),
        rules = package.rules().len(),
        violations = violations.len(),
        "validated package"
    );

    ValidationReport {
        path: package.path().clone(),
        rule_count: package.rules().len(),
        violations,
    }
}
