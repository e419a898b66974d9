use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IdentifierError, Result};

/// Classification of a rule type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Produces build outputs.
    Build,
    /// Runs tests.
    Test,
    /// Participates only in configuration (platforms, constraints).
    Configuration,
}

impl RuleKind {
    pub const ALL: [RuleKind; 3] = [Self::Build, Self::Test, Self::Configuration];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Test => "test",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IdentifierError::malformed("rule kind", s, "unknown rule kind"))
    }
}

/// The category of a build rule, e.g. `java_library` of kind [`RuleKind::Build`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RuleTypeFields")]
pub struct RuleType {
    name: String,
    kind: RuleKind,
}

#[derive(Deserialize)]
struct RuleTypeFields {
    name: String,
    kind: RuleKind,
}

impl RuleType {
    pub fn new(name: &str, kind: RuleKind) -> Result<Self> {
        if name.is_empty() {
            return Err(IdentifierError::malformed(
                "rule type",
                name,
                "rule type name must not be empty",
            ));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(IdentifierError::malformed(
                "rule type",
                name,
                "rule type name must not contain whitespace",
            ));
        }
        Ok(Self {
            name: name.to_string(),
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn is_test(&self) -> bool {
        self.kind == RuleKind::Test
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

impl TryFrom<RuleTypeFields> for RuleType {
    type Error = IdentifierError;

    fn try_from(fields: RuleTypeFields) -> Result<Self> {
        Self::new(&fields.name, fields.kind)
    }
}
