use std::collections::BTreeSet;

use bpk_types::{BuildTarget, PackagePath};
use serde::{Deserialize, Serialize};

use crate::rule::RawBuildRule;

/// A recoverable problem found while parsing one build file.
///
/// This is a value carried inside [`BuildPackage`], not a Rust error.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildPackageParsingError {
    message: String,
    stacktrace: Vec<String>,
}

impl BuildPackageParsingError {
    pub fn new<I, S>(message: impl Into<String>, stacktrace: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message: message.into(),
            stacktrace: stacktrace.into_iter().map(Into::into).collect(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stacktrace(&self) -> &[String] {
        &self.stacktrace
    }
}

/// How parsing of a build file went, judged from its package record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    /// No rules and no errors.
    Empty,
    /// Rules and no errors.
    Success,
    /// Rules alongside errors.
    PartialFailure,
    /// Errors only.
    TotalFailure,
}

/// Everything parsed out of one build file: its directory, its rules, and
/// the errors met along the way.
///
/// Rules form a set; errors keep the order in which they were discovered.
/// Packages order by path first, so sorting a batch groups it by directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildPackage {
    path: PackagePath,
    rules: BTreeSet<RawBuildRule>,
    errors: Vec<BuildPackageParsingError>,
}

impl BuildPackage {
    pub fn new(
        path: PackagePath,
        rules: impl IntoIterator<Item = RawBuildRule>,
        errors: impl IntoIterator<Item = BuildPackageParsingError>,
    ) -> Self {
        Self {
            path,
            rules: rules.into_iter().collect(),
            errors: errors.into_iter().collect(),
        }
    }

    pub fn builder(path: PackagePath) -> BuildPackageBuilder {
        BuildPackageBuilder {
            path,
            rules: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    /// Directory of the build file, relative to the cell root.
    pub fn path(&self) -> &PackagePath {
        &self.path
    }

    pub fn rules(&self) -> &BTreeSet<RawBuildRule> {
        &self.rules
    }

    pub fn errors(&self) -> &[BuildPackageParsingError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.errors.is_empty()
    }

    pub fn outcome(&self) -> ParseOutcome {
        match (self.rules.is_empty(), self.errors.is_empty()) {
            (true, true) => ParseOutcome::Empty,
            (false, true) => ParseOutcome::Success,
            (false, false) => ParseOutcome::PartialFailure,
            (true, false) => ParseOutcome::TotalFailure,
        }
    }

    /// Targets of all rules, in sorted order.
    pub fn targets(&self) -> impl Iterator<Item = &BuildTarget> {
        self.rules.iter().map(RawBuildRule::target)
    }

    /// First rule whose target has the given short name.
    pub fn rule_for(&self, short_name: &str) -> Option<&RawBuildRule> {
        self.rules
            .iter()
            .find(|rule| rule.target().short_name() == short_name)
    }
}

/// Incremental construction of a [`BuildPackage`].
#[derive(Clone, Debug)]
pub struct BuildPackageBuilder {
    path: PackagePath,
    rules: BTreeSet<RawBuildRule>,
    errors: Vec<BuildPackageParsingError>,
}

impl BuildPackageBuilder {
    pub fn rule(mut self, rule: RawBuildRule) -> Self {
        self.rules.insert(rule);
        self
    }

    pub fn error(mut self, error: BuildPackageParsingError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn build(self) -> BuildPackage {
        BuildPackage {
            path: self.path,
            rules: self.rules,
            errors: self.errors,
        }
    }
}
