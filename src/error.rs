//! General error types
//!
//! This module contains the local-misuse half of the error model,
//! [`UsageError`], along with the crate-level [`Error`] that top-level
//! entry points return.
//!
//! A `UsageError` reflects a defect in the caller or in the schema: a value
//! that does not fit its descriptor, an override that makes no sense for the
//! shape it is attached to, a type nobody registered. They are raised while
//! encoding or while resolving descriptors, never because of the contents
//! of a byte buffer. Malformed input is reported through
//! [`DecodeError`](crate::parse::error::DecodeError) instead.

use thiserror::Error;

use crate::format::Format;
use crate::parse::error::DecodeError;

/// Enumerated error type for caller- and schema-side defects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum UsageError {
    /// Null-terminated payload contained the terminator byte.
    #[error("null-terminated payload contains embedded 0x00 at index {position}")]
    EmbeddedTerminator { position: usize },
    /// An explicit format was attached to a shape it cannot represent.
    #[error("format `{format}` cannot be applied to `{shape}`")]
    IncompatibleFormatOverride { format: Format, shape: String },
    /// No codec could be derived for the named type.
    #[error("no codec available for `{0}`")]
    NoCodecAvailable(String),
    /// The value handed to a codec does not have the shape it expects.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },
    /// An integer does not fit the width of its wire format.
    #[error("value {value} out of range for format `{format}`")]
    OutOfRange { value: String, format: Format },
    /// No union variant or literal constant matched the value.
    #[error("no variant of `{0}` matches the value")]
    NoMatchingVariant(String),
    /// A record value lacks a field its descriptor includes.
    #[error("record `{record}` is missing field `{field}`")]
    MissingField { record: String, field: String },
    /// A named type refers back to itself during resolution.
    #[error("type `{0}` is self-referential")]
    CyclicType(String),
    /// The descriptor is structurally unusable (e.g. an empty union).
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    /// Serializing a generic blob failed.
    #[error("blob serialization failed: {0}")]
    Blob(String),
}

impl UsageError {
    pub(crate) fn mismatch(expected: impl std::fmt::Display, found: &crate::value::Value) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.type_name(),
        }
    }
}

/// Error returned by the top-level encode and decode entry points
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("i/o failure on stream sink: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the malformed-input error, if this is one
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Error::Decode(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the local-misuse error, if this is one
    pub fn as_usage(&self) -> Option<&UsageError> {
        match self {
            Error::Usage(err) => Some(err),
            _ => None,
        }
    }
}

/// Result alias over the crate-level [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for operations that can only fail through caller misuse
pub type UsageResult<T> = std::result::Result<T, UsageError>;
