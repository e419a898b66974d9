use bpk_types::IdentifierError;
use thiserror::Error;

/// Errors raised by the stream codec itself.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The byte source is not a valid record stream: truncated, corrupted,
    /// or written by an incompatible version.
    #[error("malformed stream at offset {offset}: {reason}")]
    MalformedStream { offset: u64, reason: String },

    #[error("record too large: {size} bytes (max {max})")]
    RecordTooLarge { size: usize, max: usize },

    #[error("record nests deeper than {max} levels")]
    RecordTooDeep { max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid codec config: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Self::MalformedStream {
            offset,
            reason: reason.into(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedStream { .. })
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised by [`json_to_build_package`](crate::record::json_to_build_package)
/// while turning a generic record into a package.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("unknown rule kind `{0}`")]
    UnknownRuleKind(String),

    #[error("unsupported attribute value at `{field}`: {value}")]
    UnsupportedValue { field: String, value: String },

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Stream(#[from] CodecError),
}

pub type RecordResult<T> = Result<T, RecordError>;
