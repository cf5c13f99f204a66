//! Error types used to report malformed input during decoding
//!
//! This module contains the malformed-input half of the crate's error
//! model. Every failure that can be provoked by the *bytes* handed to a
//! decoder, as opposed to the schema or the caller, is reported as a
//! [`DecodeError`]. These are the only errors a caller decoding untrusted
//! input is expected to guard against.
//!
//! # Layout
//!
//! A [`DecodeError`] pairs a [`DecodeErrorKind`] with the byte offset at
//! which the failure was detected, and a path of [`PathSegment`] values
//! describing the nested shape that was being decoded. The path is built
//! from the inside out: each composite codec that observes a failing child
//! pushes its own segment before propagating the error further.

use std::fmt::{Display, Formatter, Result};

use thiserror::Error;

/// Enumeration over the distinct reasons a byte sequence may be rejected
/// while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// A primitive read needed more bytes than remain in the buffer.
    #[error("needed {requested} bytes but only {available} remain")]
    UnexpectedEof { requested: usize, available: usize },
    /// A byte in boolean position (including optional presence flags)
    /// held a value other than `0x00` or `0x01`.
    #[error("invalid boolean encoding 0x{0:02x}")]
    InvalidBool(u8),
    /// A VLQ ran past the number of continuation bytes its width permits,
    /// or decoded to a magnitude beyond its declared bit-width.
    #[error("variable-length quantity exceeds {max_bits}-bit bound")]
    VlqOverflow { max_bits: u32 },
    /// A union or multi-valued literal selector named a variant that does
    /// not exist.
    #[error("variant index {index} out of range for {count} variants")]
    InvalidVariantIndex { index: u64, count: usize },
    /// A late-bound payload named a type key missing from the registry.
    #[error("late-bound tag names unregistered type `{0}`")]
    UnresolvedTypeTag(String),
    /// Text payload was not valid in its declared character encoding.
    #[error("invalid text payload: {0}")]
    InvalidText(String),
    /// An embedded generic blob could not be interpreted.
    #[error("malformed blob payload: {0}")]
    MalformedBlob(String),
    /// The payload was readable but refused: by a post-decode hook or
    /// custom codec, or because a count, bound or type tag is unusable.
    #[error("payload rejected: {0}")]
    Rejected(String),
    /// Bytes remained after a complete top-level value.
    #[error("{0} trailing bytes after complete value")]
    TrailingBytes(usize),
    /// A multi-value stream was read past its final value.
    #[error("input exhausted before start of value")]
    Exhausted,
}

/// One level of nesting within the value being decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Named field of a record
    Field(String),
    /// Position within a list-like container or fixed tuple
    Index(usize),
    /// Selected alternative of a union
    Variant(u64),
    /// Key of the n-th dictionary entry
    Key(usize),
    /// Value of the n-th dictionary entry
    Entry(usize),
    /// Payload of a late-bound tag or named type
    Type(String),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            PathSegment::Field(name) => write!(f, ".{name}"),
            PathSegment::Index(ix) => write!(f, "[{ix}]"),
            PathSegment::Variant(ix) => write!(f, "<{ix}>"),
            PathSegment::Key(ix) => write!(f, "{{key {ix}}}"),
            PathSegment::Entry(ix) => write!(f, "{{value {ix}}}"),
            PathSegment::Type(name) => write!(f, "::{name}"),
        }
    }
}

/// Malformed-input error with positional context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    offset: usize,
    path: Vec<PathSegment>,
}

impl DecodeError {
    /// Constructs a `DecodeError` detected at byte `offset`, with an empty path.
    #[must_use]
    pub fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            path: Vec::new(),
        }
    }

    /// Returns the kind of malformation that was detected
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }

    /// Returns the byte offset at which the failure was detected
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the path of nested shapes, outermost first
    pub fn path(&self) -> impl Iterator<Item = &PathSegment> {
        self.path.iter().rev()
    }

    /// Records that the failure occurred within `seg`.
    ///
    /// Segments are pushed innermost first as the error propagates
    /// outward, and reported outermost first by [`path`](Self::path).
    #[must_use]
    pub fn within(mut self, seg: PathSegment) -> Self {
        self.path.push(seg);
        self
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "malformed input at byte {}", self.offset)?;
        if !self.path.is_empty() {
            f.write_str(" (in $")?;
            for seg in self.path() {
                Display::fmt(seg, f)?;
            }
            f.write_str(")")?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Type alias for Result with an error type of [`DecodeError`]
///
/// All `Parser` methods and codec decode paths have a return type
/// of `ParseResult<T>` for various `T`.
pub type ParseResult<T> = std::result::Result<T, DecodeError>;

/// Extension methods for annotating a failing `ParseResult` with its
/// position in the enclosing shape.
pub trait ResultExt<T> {
    /// Wraps any error with the given path segment
    fn within(self, seg: impl FnOnce() -> PathSegment) -> ParseResult<T>;
}

impl<T> ResultExt<T> for ParseResult<T> {
    #[inline]
    fn within(self, seg: impl FnOnce() -> PathSegment) -> ParseResult<T> {
        self.map_err(|err| err.within(seg()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dummy<T: Send + Sync>() {}

    #[test]
    fn decode_error_threadsafe() {
        dummy::<DecodeError>()
    }

    #[test]
    fn path_reads_outermost_first() {
        let err = DecodeError::new(DecodeErrorKind::InvalidBool(7), 12)
            .within(PathSegment::Index(2))
            .within(PathSegment::Field("tags".into()));
        let path: Vec<_> = err.path().cloned().collect();
        assert_eq!(
            path,
            vec![PathSegment::Field("tags".into()), PathSegment::Index(2)]
        );
        assert_eq!(
            err.to_string(),
            "malformed input at byte 12 (in $.tags[2]): invalid boolean encoding 0x07"
        );
    }
}
