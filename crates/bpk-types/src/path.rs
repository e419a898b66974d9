//! Filesystem-agnostic package directory paths.
//!
//! A `PackagePath` names the directory containing a build file, relative to
//! the cell root:
//! - Components are separated by `/`
//! - Must not start or end with `/`
//! - Components must be non-empty and must not be `.` or `..`
//! - Components must not contain whitespace or the target delimiters `:#,`
//! - The empty path is the root package

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IdentifierError, Result};

/// Characters that delimit the parts of a target string.
const FORBIDDEN_CHARS: &[char] = &[':', '#', ','];

#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackagePath(String);

impl PackagePath {
    /// Validate and wrap a relative directory path.
    pub fn new(path: &str) -> Result<Self> {
        validate_path(path)?;
        Ok(Self(path.to_string()))
    }

    /// The root package (empty path).
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the path components. The root package has none.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Append a relative path to this one.
    pub fn join(&self, child: &str) -> Result<Self> {
        if self.is_root() {
            return Self::new(child);
        }
        if child.is_empty() {
            return Ok(self.clone());
        }
        Self::new(&format!("{}/{child}", self.0))
    }

    pub(crate) fn from_validated(path: &str) -> Self {
        Self(path.to_string())
    }
}

pub(crate) fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(IdentifierError::malformed(
            "package path",
            path,
            "must not start or end with '/'",
        ));
    }
    for component in path.split('/') {
        match component {
            "" => {
                return Err(IdentifierError::malformed(
                    "package path",
                    path,
                    "path components must not be empty",
                ))
            }
            "." | ".." => {
                return Err(IdentifierError::malformed(
                    "package path",
                    path,
                    format!("component must not be {component:?}"),
                ))
            }
            _ => {
                if let Some(ch) = component
                    .chars()
                    .find(|ch| ch.is_whitespace() || FORBIDDEN_CHARS.contains(ch))
                {
                    return Err(IdentifierError::malformed(
                        "package path",
                        path,
                        format!("contains forbidden character: {ch:?}"),
                    ));
                }
            }
        }
    }
    Ok(())
}

impl fmt::Debug for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackagePath({:?})", self.0)
    }
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PackagePath {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self> {
        validate_path(&value)?;
        Ok(Self(value))
    }
}

impl From<PackagePath> for String {
    fn from(path: PackagePath) -> Self {
        path.0
    }
}
