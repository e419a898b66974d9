use std::collections::BTreeSet;

use bpk_types::{BuildTarget, RuleType};
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeMap;

/// One rule as parsed, before its dependencies are resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RawTargetNode {
    target: BuildTarget,
    rule_type: RuleType,
    attributes: AttributeMap,
}

impl RawTargetNode {
    pub fn new(target: BuildTarget, rule_type: RuleType, attributes: AttributeMap) -> Self {
        Self {
            target,
            rule_type,
            attributes,
        }
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    pub fn rule_type(&self) -> &RuleType {
        &self.rule_type
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
}

/// A parsed rule together with the targets it declares as dependencies.
///
/// Dependencies are a set: duplicates collapse and their order carries no
/// meaning.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RawBuildRule {
    node: RawTargetNode,
    deps: BTreeSet<BuildTarget>,
}

impl RawBuildRule {
    pub fn new(node: RawTargetNode, deps: impl IntoIterator<Item = BuildTarget>) -> Self {
        Self {
            node,
            deps: deps.into_iter().collect(),
        }
    }

    pub fn node(&self) -> &RawTargetNode {
        &self.node
    }

    /// Shorthand for `self.node().target()`.
    pub fn target(&self) -> &BuildTarget {
        self.node.target()
    }

    pub fn deps(&self) -> &BTreeSet<BuildTarget> {
        &self.deps
    }

    pub fn depends_on(&self, target: &BuildTarget) -> bool {
        self.deps.contains(target)
    }
}
