//! Build package record model.
//!
//! A [`BuildPackage`] is what one build file parses into: the directory it
//! lives in, the set of [`RawBuildRule`]s it declares, and the ordered list
//! of [`BuildPackageParsingError`]s met while parsing it. Every type is an
//! immutable value with structural equality.
//!
//! Rules and dependencies are `BTreeSet`s, so duplicates collapse and
//! enumeration order never affects equality. Errors are a `Vec` and keep
//! their discovery order.

pub mod attribute;
pub mod package;
pub mod rule;
pub mod validation;

pub use attribute::{AttributeMap, AttributeValue};
pub use package::{BuildPackage, BuildPackageBuilder, BuildPackageParsingError, ParseOutcome};
pub use rule::{RawBuildRule, RawTargetNode};
pub use validation::{validate, ValidationReport, Violation, ViolationKind};
