//! Identifier types for build packages.
//!
//! Every identifier here is an immutable value with structural equality,
//! hashing and ordering. Construction validates the fields and fails with
//! [`IdentifierError::MalformedIdentifier`]; a value that exists is always
//! well-formed.
//!
//! # Key Types
//!
//! - [`CellName`]: Optional, canonicalized name of a source-control cell
//! - [`BuildTarget`]: Unconfigured target: cell, base path, short name, flavors
//! - [`RuleType`]: Rule name plus its [`RuleKind`]
//! - [`PackagePath`]: Filesystem-agnostic directory of a build file

pub mod cell;
pub mod error;
pub mod path;
pub mod rule_type;
pub mod target;

pub use cell::CellName;
pub use error::{IdentifierError, Result};
pub use path::PackagePath;
pub use rule_type::{RuleKind, RuleType};
pub use target::BuildTarget;
