//! Byte-level parsing model
//!
//! This module provides the read side of the byte stream: the [`Parser`]
//! trait, with default implementations for every primitive read the codecs
//! need, and [`ByteParser`], the cursor over an in-memory buffer that all
//! decoding in this crate is driven by.
//!
//! For shape-aware decoding, see [`Decode`](crate::conv::Decode) for native
//! Rust types and [`Codec`](crate::codec::Codec) for descriptor-driven
//! decoding into [`Value`](crate::value::Value).
//!
//! # Model
//!
//! * A parser is constructed over an immutable byte-buffer, with its offset at `0`.
//! * Parsing is non-backtracking and zero-lookahead: a byte can only be viewed by
//!   consuming it, and once consumed it cannot be consumed again.
//! * A read that would run past the end of the buffer fails with
//!   [`UnexpectedEof`](error::DecodeErrorKind::UnexpectedEof) and consumes nothing.
//! * Every error carries the offset at which the failing read began.

pub mod error;

use error::{DecodeError, DecodeErrorKind, ParseResult};

use crate::vlq::max_groups;

/// Stateful reader over a byte buffer
///
/// Implementors supply the four required methods; every `take_*` method is
/// defined in terms of them.
///
/// The following properties should hold of every implementation:
///
/// * A fresh parser has `offset() == 0` and `remainder()` equal to the buffer length.
/// * `remainder()` is the largest `n` for which `consume(n)` succeeds.
/// * A successful `consume(n)` advances `offset()` by exactly `n`; a failing
///   one leaves it unchanged.
pub trait Parser {
    /// Number of bytes in the underlying buffer
    fn view_len(&self) -> usize;

    /// Number of bytes consumed so far
    fn offset(&self) -> usize;

    /// Consumes and returns the byte at the current offset.
    fn consume_byte(&mut self) -> ParseResult<u8>;

    /// Consumes and returns the next `nbytes` bytes.
    ///
    /// # Invariants
    ///
    /// This method **MUST** return `Ok(s)` when and only when at least
    /// `nbytes` bytes remain, and in such cases `s.len() == nbytes`.
    fn consume(&mut self, nbytes: usize) -> ParseResult<&[u8]>;

    /// Number of bytes that can still be consumed
    #[inline]
    fn remainder(&self) -> usize {
        self.view_len() - self.offset()
    }

    /// Returns `true` if every byte of the buffer has been consumed
    #[inline]
    fn is_exhausted(&self) -> bool {
        self.remainder() == 0
    }

    /// Constructs an error of the given kind at the current offset
    #[inline]
    fn fail(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(kind, self.offset())
    }

    /// Consumes `N` bytes and returns them in array-form
    fn consume_arr<const N: usize>(&mut self) -> ParseResult<[u8; N]> {
        let mut ret = [0u8; N];
        ret.copy_from_slice(self.consume(N)?);
        Ok(ret)
    }

    #[inline]
    fn take_u8(&mut self) -> ParseResult<u8> {
        self.consume_byte()
    }

    #[inline]
    fn take_i8(&mut self) -> ParseResult<i8> {
        Ok(self.consume_byte()? as i8)
    }

    /// Consumes two bytes and returns the corresponding `u16` value
    ///
    /// As with all fixed-width multi-byte numeric `take_X` methods,
    /// this method performs a little-endian conversion.
    #[inline]
    fn take_u16(&mut self) -> ParseResult<u16> {
        self.consume_arr::<2>().map(u16::from_le_bytes)
    }

    #[inline]
    fn take_i16(&mut self) -> ParseResult<i16> {
        self.consume_arr::<2>().map(i16::from_le_bytes)
    }

    #[inline]
    fn take_u32(&mut self) -> ParseResult<u32> {
        self.consume_arr::<4>().map(u32::from_le_bytes)
    }

    #[inline]
    fn take_i32(&mut self) -> ParseResult<i32> {
        self.consume_arr::<4>().map(i32::from_le_bytes)
    }

    #[inline]
    fn take_u64(&mut self) -> ParseResult<u64> {
        self.consume_arr::<8>().map(u64::from_le_bytes)
    }

    #[inline]
    fn take_i64(&mut self) -> ParseResult<i64> {
        self.consume_arr::<8>().map(i64::from_le_bytes)
    }

    #[inline]
    fn take_f32(&mut self) -> ParseResult<f32> {
        self.consume_arr::<4>().map(f32::from_le_bytes)
    }

    #[inline]
    fn take_f64(&mut self) -> ParseResult<f64> {
        self.consume_arr::<8>().map(f64::from_le_bytes)
    }

    /// Consumes a single byte and returns the boolean value it represents
    ///
    /// The only valid boolean encodings are `0x01` for `true` and `0x00`
    /// for `false`.
    ///
    /// # Errors
    ///
    /// If the consume operation itself fails, returns the original error.
    /// Otherwise returns `InvalidBool` containing the offending byte.
    #[inline]
    fn take_bool(&mut self) -> ParseResult<bool> {
        match self.consume_byte()? {
            0x01 => Ok(true),
            0x00 => Ok(false),
            byte => Err(DecodeError::new(
                DecodeErrorKind::InvalidBool(byte),
                self.offset() - 1,
            )),
        }
    }

    /// Consumes and returns a `Vec<u8>` of length `nbytes`, following
    /// the same behavioral guarantees as [`consume`](Parser::consume).
    #[inline]
    fn take_dynamic(&mut self, nbytes: usize) -> ParseResult<Vec<u8>> {
        self.consume(nbytes).map(Vec::from)
    }

    /// Consumes the raw bytes of a single VLQ, up to and including the
    /// first byte whose continuation bit is clear.
    ///
    /// When `max_bits` is given, a VLQ that runs past the number of groups
    /// required for a `max_bits`-bit magnitude fails with `VlqOverflow`.
    fn take_vlq_groups(&mut self, max_bits: Option<u32>) -> ParseResult<Vec<u8>> {
        let start = self.offset();
        let limit = max_bits.map(max_groups);
        let mut ret = Vec::new();
        loop {
            let byte = self.consume_byte()?;
            ret.push(byte);
            if byte & 0x80 == 0 {
                break Ok(ret);
            }
            if let (Some(limit), Some(bits)) = (limit, max_bits) {
                if ret.len() >= limit {
                    break Err(DecodeError::new(
                        DecodeErrorKind::VlqOverflow { max_bits: bits },
                        start,
                    ));
                }
            }
        }
    }

    /// Consumes an unsigned VLQ whose magnitude must fit in `max_bits` bits
    /// (at most 64).
    ///
    /// # Errors
    ///
    /// Returns `VlqOverflow` if the encoding uses more groups than the bound
    /// permits, or if it decodes to a magnitude beyond the bound. Returns
    /// `UnexpectedEof` if the buffer ends before the final group.
    fn take_vlq(&mut self, max_bits: u32) -> ParseResult<u64> {
        let start = self.offset();
        let max_bits = max_bits.min(64);
        let overflow = || DecodeError::new(DecodeErrorKind::VlqOverflow { max_bits }, start);
        let groups = self.take_vlq_groups(Some(max_bits))?;
        let mut acc: u64 = 0;
        for (i, byte) in groups.into_iter().enumerate() {
            let chunk = u64::from(byte & 0x7f);
            let shift = 7 * i as u32;
            if chunk != 0 {
                if shift >= 64 || (chunk << shift) >> shift != chunk {
                    return Err(overflow());
                }
                acc |= chunk << shift;
            }
        }
        if max_bits < 64 && acc >> max_bits != 0 {
            return Err(overflow());
        }
        Ok(acc)
    }

    /// Consumes a VLQ length `n` and then `n` raw bytes.
    fn take_prefixed(&mut self) -> ParseResult<&[u8]> {
        let len = self.take_vlq(64)?;
        let available = self.remainder();
        match usize::try_from(len) {
            Ok(n) if n <= available => self.consume(n),
            _ => Err(self.fail(DecodeErrorKind::UnexpectedEof {
                requested: usize::try_from(len).unwrap_or(usize::MAX),
                available,
            })),
        }
    }

    /// Consumes bytes up to and including the first `0x00`, returning
    /// everything before it.
    ///
    /// # Errors
    ///
    /// If the buffer ends before a terminator is found, returns
    /// `UnexpectedEof` at the offset where the payload began.
    fn take_terminated(&mut self) -> ParseResult<Vec<u8>> {
        let start = self.offset();
        let mut ret = Vec::new();
        loop {
            match self.consume_byte() {
                Ok(0x00) => break Ok(ret),
                Ok(byte) => ret.push(byte),
                Err(_) => {
                    break Err(DecodeError::new(
                        DecodeErrorKind::UnexpectedEof {
                            requested: ret.len() + 1,
                            available: ret.len(),
                        },
                        start,
                    ))
                }
            }
        }
    }
}

/// Cursor over a borrowed byte slice
///
/// `ByteParser` is the only [`Parser`] the codecs are driven by. It is
/// exclusively owned by one decode call and never shared.
#[derive(Debug, Clone)]
pub struct ByteParser<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> ByteParser<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    /// Verifies that every byte was consumed, returning a `TrailingBytes`
    /// error otherwise.
    pub fn finish(self) -> ParseResult<()> {
        match self.remainder() {
            0 => Ok(()),
            n => Err(self.fail(DecodeErrorKind::TrailingBytes(n))),
        }
    }
}

impl<'a> From<&'a [u8]> for ByteParser<'a> {
    fn from(buffer: &'a [u8]) -> Self {
        Self::new(buffer)
    }
}

impl Parser for ByteParser<'_> {
    #[inline]
    fn view_len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    fn offset(&self) -> usize {
        self.offset
    }

    fn consume_byte(&mut self) -> ParseResult<u8> {
        match self.buffer.get(self.offset) {
            Some(&byte) => {
                self.offset += 1;
                Ok(byte)
            }
            None => Err(self.fail(DecodeErrorKind::UnexpectedEof {
                requested: 1,
                available: 0,
            })),
        }
    }

    fn consume(&mut self, nbytes: usize) -> ParseResult<&[u8]> {
        let available = self.remainder();
        if nbytes > available {
            return Err(self.fail(DecodeErrorKind::UnexpectedEof {
                requested: nbytes,
                available,
            }));
        }
        let start = self.offset;
        self.offset += nbytes;
        Ok(&self.buffer[start..self.offset])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn little_endian() {
        let mut p = ByteParser::new(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(p.take_u16().unwrap(), 0x0201);
        assert_eq!(p.take_u16().unwrap(), 0x0403);
        assert_eq!(p.offset(), 4);
        assert_eq!(p.remainder(), 1);
    }

    #[test]
    fn eof_consumes_nothing() {
        let mut p = ByteParser::new(&[]);
        let err = p.take_u32().unwrap_err();
        assert_eq!(
            err.kind(),
            &DecodeErrorKind::UnexpectedEof {
                requested: 4,
                available: 0
            }
        );
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn bool_strict() {
        let mut p = ByteParser::new(&[0x01, 0x00, 0xff]);
        assert!(p.take_bool().unwrap());
        assert!(!p.take_bool().unwrap());
        let err = p.take_bool().unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::InvalidBool(0xff));
        assert_eq!(err.offset(), 2);
    }

    #[test]
    fn vlq_reads() {
        assert_eq!(ByteParser::new(&[0xac, 0x02]).take_vlq(64).unwrap(), 300);
        assert_eq!(ByteParser::new(&[0x00]).take_vlq(8).unwrap(), 0);
        assert_eq!(ByteParser::new(&[0xff, 0x01]).take_vlq(8).unwrap(), 255);
        let max = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert_eq!(ByteParser::new(&max).take_vlq(64).unwrap(), u64::MAX);
    }

    #[test]
    fn vlq_overflow() {
        // 256 does not fit in 8 bits
        let err = ByteParser::new(&[0x80, 0x02]).take_vlq(8).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::VlqOverflow { max_bits: 8 });
        // more continuation bytes than 8 bits can ever need
        let err = ByteParser::new(&[0x80, 0x80, 0x00]).take_vlq(8).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::VlqOverflow { max_bits: 8 });
        // tenth group carries more than one bit
        let wide = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        let err = ByteParser::new(&wide).take_vlq(64).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::VlqOverflow { max_bits: 64 });
    }

    #[test]
    fn vlq_truncated() {
        let err = ByteParser::new(&[0x80]).take_vlq(64).unwrap_err();
        assert!(matches!(err.kind(), DecodeErrorKind::UnexpectedEof { .. }));
    }

    #[test]
    fn prefixed_and_terminated() {
        let mut p = ByteParser::new(&[0x03, b'a', b'b', b'c', b'x', 0x00]);
        assert_eq!(p.take_prefixed().unwrap(), b"abc");
        assert_eq!(p.take_terminated().unwrap(), b"x".to_vec());
        assert!(p.is_exhausted());

        let err = ByteParser::new(&[0x05, b'a']).take_prefixed().unwrap_err();
        assert_eq!(
            err.kind(),
            &DecodeErrorKind::UnexpectedEof {
                requested: 5,
                available: 1
            }
        );

        let err = ByteParser::new(b"abc").take_terminated().unwrap_err();
        assert_eq!(err.offset(), 0);
    }

    #[test]
    fn finish_reports_trailing() {
        let mut p = ByteParser::new(&[0x01, 0x02]);
        p.take_u8().unwrap();
        assert_eq!(
            p.finish().unwrap_err().kind(),
            &DecodeErrorKind::TrailingBytes(1)
        );
    }
}
