use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cell::CellName;
use crate::error::{IdentifierError, Result};
use crate::path::{validate_path, PackagePath};

/// Prefix every base path starts with.
const PACKAGE_PREFIX: &str = "//";

/// Characters that may not appear in a target short name.
const NAME_FORBIDDEN_CHARS: &[char] = &[':', '#', '/', ','];

/// Characters that may not appear in a flavor.
const FLAVOR_FORBIDDEN_CHARS: &[char] = &['#', ','];

/// An unconfigured build target, e.g. `cell//foo/bar:baz#flavor`.
///
/// Equality, hashing and ordering are structural. Fields are compared in
/// declaration order: cell name, base path, short name, then flavors, so
/// sorting a set of targets groups them by cell and package.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildTarget {
    cell: CellName,
    base_path: String,
    short_name: String,
    flavors: BTreeSet<String>,
}

impl BuildTarget {
    /// Build a target from its parts.
    ///
    /// `base_path` must start with `//` followed by a valid package path.
    pub fn new<I, S>(cell: CellName, base_path: &str, short_name: &str, flavors: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let package = base_path.strip_prefix(PACKAGE_PREFIX).ok_or_else(|| {
            IdentifierError::malformed("base path", base_path, "must start with '//'")
        })?;
        validate_path(package)?;
        validate_short_name(short_name)?;
        let flavors = flavors
            .into_iter()
            .map(|flavor| {
                let flavor: String = flavor.into();
                validate_flavor(&flavor).map(|()| flavor)
            })
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self {
            cell,
            base_path: base_path.to_string(),
            short_name: short_name.to_string(),
            flavors,
        })
    }

    /// Parse the string form `[cell]//base/path:name[#flavor,...]`.
    pub fn parse(s: &str) -> Result<Self> {
        let (cell, rest) = s
            .split_once(PACKAGE_PREFIX)
            .ok_or_else(|| IdentifierError::malformed("build target", s, "missing '//'"))?;
        let cell = CellName::new(Some(cell))?;

        let (label, flavors) = match rest.split_once('#') {
            Some((label, flavors)) => (label, Some(flavors)),
            None => (rest, None),
        };
        let (package, name) = label
            .rsplit_once(':')
            .ok_or_else(|| IdentifierError::malformed("build target", s, "missing ':'"))?;

        let flavors: Vec<&str> = match flavors {
            Some(flavors) => flavors.split(',').collect(),
            None => Vec::new(),
        };
        Self::new(cell, &format!("{PACKAGE_PREFIX}{package}"), name, flavors)
    }

    pub fn cell(&self) -> &CellName {
        &self.cell
    }

    /// The base path including its leading `//`.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn flavors(&self) -> &BTreeSet<String> {
        &self.flavors
    }

    pub fn is_flavored(&self) -> bool {
        !self.flavors.is_empty()
    }

    /// The directory of the package this target belongs to.
    pub fn package_path(&self) -> PackagePath {
        PackagePath::from_validated(&self.base_path[PACKAGE_PREFIX.len()..])
    }

    /// A copy of this target with `flavors` added.
    pub fn with_flavors<I, S>(&self, flavors: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut target = self.clone();
        for flavor in flavors {
            let flavor: String = flavor.into();
            validate_flavor(&flavor)?;
            target.flavors.insert(flavor);
        }
        Ok(target)
    }

    /// A copy of this target without flavors.
    pub fn unflavored(&self) -> Self {
        Self {
            flavors: BTreeSet::new(),
            ..self.clone()
        }
    }

    pub fn fully_qualified_name(&self) -> String {
        self.to_string()
    }
}

fn validate_short_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IdentifierError::malformed(
            "short name",
            name,
            "short name must not be empty",
        ));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| ch.is_whitespace() || NAME_FORBIDDEN_CHARS.contains(ch))
    {
        return Err(IdentifierError::malformed(
            "short name",
            name,
            format!("contains forbidden character: {ch:?}"),
        ));
    }
    Ok(())
}

fn validate_flavor(flavor: &str) -> Result<()> {
    if flavor.is_empty() {
        return Err(IdentifierError::malformed(
            "flavor",
            flavor,
            "flavor must not be empty",
        ));
    }
    if let Some(ch) = flavor
        .chars()
        .find(|ch| ch.is_whitespace() || FLAVOR_FORBIDDEN_CHARS.contains(ch))
    {
        return Err(IdentifierError::malformed(
            "flavor",
            flavor,
            format!("contains forbidden character: {ch:?}"),
        ));
    }
    Ok(())
}

impl fmt::Debug for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuildTarget({self})")
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", self.cell, self.base_path, self.short_name)?;
        let mut flavors = self.flavors.iter();
        if let Some(first) = flavors.next() {
            write!(f, "#{first}")?;
            for flavor in flavors {
                write!(f, ",{flavor}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for BuildTarget {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BuildTarget {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BuildTarget> for String {
    fn from(target: BuildTarget) -> Self {
        target.to_string()
    }
}
