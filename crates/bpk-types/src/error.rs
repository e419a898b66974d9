use thiserror::Error;

/// Errors produced when constructing identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("malformed {kind} `{value}`: {reason}")]
    MalformedIdentifier {
        kind: &'static str,
        value: String,
        reason: String,
    },
}

impl IdentifierError {
    pub(crate) fn malformed(
        kind: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedIdentifier {
            kind,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IdentifierError>;
