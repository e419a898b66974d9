use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IdentifierError, Result};

/// Characters that may not appear in a cell name.
const FORBIDDEN_CHARS: &[char] = &['/', ':', '#', ',', '@'];

/// Canonical name of a source-control cell.
///
/// The root cell has no name. An empty name is canonicalized to the root
/// cell so that `CellName::new(Some(""))` and `CellName::root()` compare
/// equal. Ordering puts the root cell first, then named cells
/// lexicographically.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub struct CellName(Option<String>);

impl CellName {
    /// Create a cell name, validating the characters of a named cell.
    pub fn new(name: Option<&str>) -> Result<Self> {
        match name {
            None | Some("") => Ok(Self::root()),
            Some(name) => {
                if let Some(ch) = name
                    .chars()
                    .find(|ch| ch.is_whitespace() || FORBIDDEN_CHARS.contains(ch))
                {
                    return Err(IdentifierError::malformed(
                        "cell name",
                        name,
                        format!("contains forbidden character: {ch:?}"),
                    ));
                }
                Ok(Self(Some(name.to_string())))
            }
        }
    }

    /// Shorthand for a named cell.
    pub fn named(name: &str) -> Result<Self> {
        Self::new(Some(name))
    }

    /// The unnamed root cell.
    pub const fn root() -> Self {
        Self(None)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for CellName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "CellName({name})"),
            None => write!(f, "CellName(<root>)"),
        }
    }
}

impl fmt::Display for CellName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or(""))
    }
}

impl TryFrom<Option<String>> for CellName {
    type Error = IdentifierError;

    fn try_from(value: Option<String>) -> Result<Self> {
        Self::new(value.as_deref())
    }
}

impl From<CellName> for Option<String> {
    fn from(cell: CellName) -> Self {
        cell.0
    }
}
