//! Wire primitive catalogue
//!
//! Every leaf of an encoded value is written in one of the [`Format`]s
//! listed here. Formats are named by short tags (`u8`, `w64`, `utf-16`, ...)
//! which round-trip through [`Display`] and [`FromStr`], and which are the
//! spelling accepted in configuration files.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UsageError;

/// Explicit wire format for a leaf value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Format {
    /// One byte, `0x00` or `0x01`
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Unsigned VLQ whose decoded magnitude must fit in 8 bits
    V8,
    V16,
    V32,
    V64,
    /// Zig-zag signed VLQ whose decoded value must fit in 8 bits
    W8,
    W16,
    W32,
    W64,
    /// Unsigned VLQ of unbounded width
    Vn,
    /// Zig-zag signed VLQ of unbounded width
    Wn,
    /// Length-prefixed raw bytes
    Bytes,
    /// Raw bytes followed by a single `0x00`
    NtBytes,
    Utf8,
    /// Length-prefixed UTF-16 with a leading byte-order mark
    Utf16,
    /// Generic self-contained JSON text blob
    Json,
    /// Late-bound tag: registry key followed by the payload of that type
    Type,
    /// Opaque binary blob of the whole value tree
    Blob,
    /// Zero bytes
    Void,
}

impl Format {
    pub const ALL: [Format; 29] = [
        Format::Bool,
        Format::U8,
        Format::U16,
        Format::U32,
        Format::U64,
        Format::I8,
        Format::I16,
        Format::I32,
        Format::I64,
        Format::F32,
        Format::F64,
        Format::V8,
        Format::V16,
        Format::V32,
        Format::V64,
        Format::W8,
        Format::W16,
        Format::W32,
        Format::W64,
        Format::Vn,
        Format::Wn,
        Format::Bytes,
        Format::NtBytes,
        Format::Utf8,
        Format::Utf16,
        Format::Json,
        Format::Type,
        Format::Blob,
        Format::Void,
    ];

    pub const fn tag(self) -> &'static str {
        match self {
            Format::Bool => "bool",
            Format::U8 => "u8",
            Format::U16 => "u16",
            Format::U32 => "u32",
            Format::U64 => "u64",
            Format::I8 => "i8",
            Format::I16 => "i16",
            Format::I32 => "i32",
            Format::I64 => "i64",
            Format::F32 => "f32",
            Format::F64 => "f64",
            Format::V8 => "v8",
            Format::V16 => "v16",
            Format::V32 => "v32",
            Format::V64 => "v64",
            Format::W8 => "w8",
            Format::W16 => "w16",
            Format::W32 => "w32",
            Format::W64 => "w64",
            Format::Vn => "vn",
            Format::Wn => "wn",
            Format::Bytes => "bytes",
            Format::NtBytes => "nt-bytes",
            Format::Utf8 => "utf-8",
            Format::Utf16 => "utf-16",
            Format::Json => "json",
            Format::Type => "type",
            Format::Blob => "blob",
            Format::Void => "void",
        }
    }

    /// Whether values in this format are integers
    pub const fn is_integer(self) -> bool {
        self.int_range().is_some() || matches!(self, Format::Vn | Format::Wn)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Format::F32 | Format::F64)
    }

    /// Width in bytes of the raw little-endian formats
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Format::Bool | Format::U8 | Format::I8 => Some(1),
            Format::U16 | Format::I16 => Some(2),
            Format::U32 | Format::I32 | Format::F32 => Some(4),
            Format::U64 | Format::I64 | Format::F64 => Some(8),
            _ => None,
        }
    }

    /// Bound on the decoded magnitude of the bounded VLQ formats, in bits
    pub const fn vlq_bits(self) -> Option<u32> {
        match self {
            Format::V8 | Format::W8 => Some(8),
            Format::V16 | Format::W16 => Some(16),
            Format::V32 | Format::W32 => Some(32),
            Format::V64 | Format::W64 => Some(64),
            _ => None,
        }
    }

    /// Whether this is one of the zig-zag signed VLQ formats
    pub const fn is_zigzag(self) -> bool {
        matches!(
            self,
            Format::W8 | Format::W16 | Format::W32 | Format::W64 | Format::Wn
        )
    }

    /// Inclusive range of integers representable in a bounded integer format
    pub const fn int_range(self) -> Option<(i128, i128)> {
        Some(match self {
            Format::U8 | Format::V8 => (0, u8::MAX as i128),
            Format::U16 | Format::V16 => (0, u16::MAX as i128),
            Format::U32 | Format::V32 => (0, u32::MAX as i128),
            Format::U64 | Format::V64 => (0, u64::MAX as i128),
            Format::I8 | Format::W8 => (i8::MIN as i128, i8::MAX as i128),
            Format::I16 | Format::W16 => (i16::MIN as i128, i16::MAX as i128),
            Format::I32 | Format::W32 => (i32::MIN as i128, i32::MAX as i128),
            Format::I64 | Format::W64 => (i64::MIN as i128, i64::MAX as i128),
            _ => return None,
        })
    }

    /// Smallest unsigned fixed-width format holding every integer in
    /// `0..max_exclusive`, or [`Format::Vn`] when none does.
    pub fn for_int_range(max_exclusive: u128) -> Format {
        [Format::U8, Format::U16, Format::U32, Format::U64]
            .into_iter()
            .find(|f| {
                f.int_range()
                    .map_or(false, |(_, hi)| max_exclusive <= hi as u128 + 1)
            })
            .unwrap_or(Format::Vn)
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Format {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|f| f.tag() == s)
            .ok_or_else(|| UsageError::InvalidDescriptor(format!("unknown format tag `{s}`")))
    }
}

impl TryFrom<String> for Format {
    type Error = UsageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Format> for String {
    fn from(value: Format) -> Self {
        value.tag().to_owned()
    }
}

/// Encoding used for an explicit opaque blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobFormat {
    /// Length-prefixed UTF-8 JSON text
    Json,
    /// Length-prefixed binary serialization of the value tree
    Binary,
}

impl BlobFormat {
    pub const fn as_format(self) -> Format {
        match self {
            BlobFormat::Json => Format::Json,
            BlobFormat::Binary => Format::Blob,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for f in Format::ALL {
            assert_eq!(f.tag().parse::<Format>().unwrap(), f);
        }
        assert!("u128".parse::<Format>().is_err());
    }

    #[test]
    fn smallest_width() {
        assert_eq!(Format::for_int_range(0), Format::U8);
        assert_eq!(Format::for_int_range(256), Format::U8);
        assert_eq!(Format::for_int_range(257), Format::U16);
        assert_eq!(Format::for_int_range(1 << 32), Format::U32);
        assert_eq!(Format::for_int_range((1 << 32) + 1), Format::U64);
        assert_eq!(Format::for_int_range(u128::MAX), Format::Vn);
    }

    #[test]
    fn kinds() {
        assert!(Format::W32.is_integer() && Format::Vn.is_integer());
        assert!(!Format::F32.is_integer() && Format::F32.is_float());
        assert_eq!(Format::V16.vlq_bits(), Some(16));
        assert!(Format::Wn.is_zigzag() && !Format::V64.is_zigzag());
    }

    #[test]
    fn serde_uses_tags() {
        let f: Format = serde_json::from_str("\"nt-bytes\"").unwrap();
        assert_eq!(f, Format::NtBytes);
        assert_eq!(serde_json::to_string(&Format::Utf16).unwrap(), "\"utf-16\"");
    }
}
