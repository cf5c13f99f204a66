//! Core of the static binary-conversion API
//!
//! This module contains definitions for the transcoding traits `Encode` and
//! `Decode`, which are motivationally equivalent to the `Serialize` and
//! `Deserialize` traits defined in `serde`, but fixed to this crate's wire
//! format.
//!
//! They are implemented for the native Rust types that have a single
//! canonical encoding (see [`prim`](crate::prim) and [`vlq`](crate::vlq)),
//! and are what the descriptor-driven [`Codec`](crate::codec::Codec) tree
//! bottoms out in for its leaves.
//!
//! The sub-module [`target`] offers the [`target::Target`] trait, an
//! abstraction along the lines of [`std::io::Write`] that is the dual to
//! [`crate::parse::Parser`].

use crate::parse::error::ParseResult;
use crate::parse::{ByteParser, Parser};

use self::target::Target;

pub mod target;

/// Trait for types with a single canonical binary serialization
///
/// Implementing [`Encode`] can be as simple as providing a definition of the
/// required method [`write_to`](Encode::write_to).
pub trait Encode {
    /// Appends the serialized bytes of this value to a generic buffer,
    /// returning the exact number of bytes written
    ///
    /// Morally related to [`std::io::Write::write`], with the caveat that
    /// `write_to` is infallible, as well as being generic over any buffer
    /// that satisfies the trait-bound of [`Target`].
    fn write_to<U: Target>(&self, buf: &mut U) -> usize;

    /// Appends the serialized bytes of this value to a monomorphized [`Vec<u8>`] buffer.
    #[inline]
    fn write_to_vec(&self, buf: &mut Vec<u8>) {
        let _ = self.write_to(buf);
    }

    /// Creates a new `Target` and fills it with the serialized bytes of this value.
    #[must_use]
    #[inline]
    fn encode<U: Target>(&self) -> U {
        let mut buf: U = U::create();
        let _ = self.write_to::<U>(&mut buf);
        buf
    }

    /// Creates a [`Vec<u8>`] and fills it with the serialized bytes of this value.
    #[must_use]
    #[inline]
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to_vec(&mut buf);
        buf
    }

    /// Computes, without allocation, the number of bytes in the serialized
    /// form of `self`, by writing it to a [`ByteCounter`](target::ByteCounter).
    #[must_use]
    #[inline]
    fn enc_len(&self) -> usize {
        self.write_to(&mut std::io::sink())
    }
}

/// Trait providing methods for deserializing binary data into values of a certain type
///
/// It is almost always expected that a type implementing `Decode` will also
/// implement [`Encode`], and that the two are mutually inverse.
pub trait Decode {
    /// Attempt to consume and interpret a value of type `Self` from an existing
    /// `Parser` object over a binary buffer.
    ///
    /// # Errors
    ///
    /// In most cases, the errors returned by this method will be propagated from
    /// calls made to [`Parser`] methods in the implementation logic.
    fn parse<P: Parser>(p: &mut P) -> ParseResult<Self>
    where
        Self: Sized;

    /// Decodes a value of the `Self` type from the whole of `input`.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by [`parse`](Decode::parse). In addition,
    /// if the feature-flag `check_complete_parse` is enabled, fails with
    /// `TrailingBytes` when `input` is not consumed in full.
    fn decode_bytes(input: &[u8]) -> ParseResult<Self>
    where
        Self: Sized,
    {
        let mut p = ByteParser::new(input);
        let ret = Self::parse(&mut p)?;
        cfg_if::cfg_if! {
            if #[cfg(feature = "check_complete_parse")] {
                p.finish()?;
            } else {
                let _ = p;
            }
        }
        Ok(ret)
    }
}
