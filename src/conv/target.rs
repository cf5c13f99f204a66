//! Byte sinks for serialization
//!
//! [`Target`] is the write side of the byte stream, dual to
//! [`Parser`](crate::parse::Parser). Every encoder in this crate writes
//! through it.

use crate::error::{UsageError, UsageResult};
use crate::vlq;

/// Marker trait for byte-oriented buffers with incremental append operations
///
/// In most ways, it is convenient to think of `Target` as an analogous trait to
/// [`std::io::Write`]. The principal difference between the two is the fact
/// that the `push_XXX` methods on `Target` are infallible and total; while they
/// return a `usize` value representing the number of bytes written, this is used
/// only for summary book-keeping on the caller side.
///
/// The one fallible operation, [`push_terminated`](Target::push_terminated),
/// validates its input before writing anything.
pub trait Target {
    /// Reserves room for at least `extra` additional bytes, where that means
    /// anything for the implementor.
    fn anticipate(&mut self, extra: usize);

    /// Returns a fresh object of the `Self` type with an initially empty buffer.
    fn create() -> Self;

    /// Appends a single byte, returning `1`.
    fn push_one(&mut self, b: u8) -> usize;

    /// Appends the bytes in a known-length array, returning `N`.
    ///
    /// ```ignore
    /// x.push_many(*b"Rust") === x.push_one(b'R') + x.push_one(b'u') + x.push_one(b's') + x.push_one(b't')
    /// ```
    fn push_many<const N: usize>(&mut self, arr: [u8; N]) -> usize;

    /// Appends an arbitrary-length byte-slice, returning its length.
    fn push_all(&mut self, buf: &[u8]) -> usize;

    /// Book-ends a sequence of `push_XXX` operations that represent a logical unit.
    ///
    /// Must not influence the contents of the buffer, so the default is a no-op.
    #[inline(always)]
    fn resolve(&mut self) {}

    /// Performs [`resolve`](Target::resolve) and returns `0usize`
    #[inline]
    fn resolve_zero(&mut self) -> usize {
        self.resolve();
        0
    }

    /// Appends the unsigned VLQ serialization of `value`.
    fn push_vlq(&mut self, value: u64) -> usize {
        let (buf, len) = vlq::encode_u64(value);
        self.push_all(&buf[..len])
    }

    /// Appends the VLQ length of `bytes` followed by `bytes` itself.
    fn push_prefixed(&mut self, bytes: &[u8]) -> usize {
        self.anticipate(bytes.len() + vlq::encoded_len(bytes.len() as u64));
        self.push_vlq(bytes.len() as u64) + self.push_all(bytes)
    }

    /// Appends `bytes` followed by a single `0x00`.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::EmbeddedTerminator`] without writing anything
    /// if `bytes` itself contains a `0x00`.
    fn push_terminated(&mut self, bytes: &[u8]) -> UsageResult<usize> {
        if let Some(position) = bytes.iter().position(|&b| b == 0x00) {
            return Err(UsageError::EmbeddedTerminator { position });
        }
        Ok(self.push_all(bytes) + self.push_one(0x00))
    }
}

/// Useful alias for `std::io::Sink` that is used to count the number of
/// bytes required to serialize a value without performing any memory
/// operations.
pub type ByteCounter = std::io::Sink;

impl Target for ByteCounter {
    #[inline(always)]
    fn anticipate(&mut self, _: usize) {}

    #[inline]
    fn create() -> Self {
        std::io::sink()
    }

    #[inline(always)]
    fn push_one(&mut self, _: u8) -> usize {
        1
    }

    #[inline(always)]
    fn push_many<const N: usize>(&mut self, _: [u8; N]) -> usize {
        N
    }

    #[inline(always)]
    fn push_all(&mut self, buf: &[u8]) -> usize {
        buf.len()
    }
}

impl Target for Vec<u8> {
    #[inline]
    fn anticipate(&mut self, extra: usize) {
        self.reserve(extra)
    }

    #[inline]
    fn create() -> Self {
        Self::new()
    }

    #[inline]
    fn push_one(&mut self, b: u8) -> usize {
        self.push(b);
        1
    }

    #[inline]
    fn push_many<const N: usize>(&mut self, arr: [u8; N]) -> usize {
        self.extend(&arr);
        N
    }

    #[inline]
    fn push_all(&mut self, buf: &[u8]) -> usize {
        self.extend_from_slice(buf);
        buf.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vlq_bytes() {
        let mut buf = Vec::new();
        assert_eq!(buf.push_vlq(300), 2);
        assert_eq!(buf, vec![0xac, 0x02]);
    }

    #[test]
    fn prefixed() {
        let mut buf = Vec::new();
        assert_eq!(buf.push_prefixed(b"hi"), 3);
        assert_eq!(buf, vec![0x02, b'h', b'i']);
    }

    #[test]
    fn terminated_rejects_embedded_zero() {
        let mut buf = vec![0xaa];
        let err = buf.push_terminated(b"a\0b").unwrap_err();
        assert_eq!(err, UsageError::EmbeddedTerminator { position: 1 });
        assert_eq!(buf, vec![0xaa]);
        assert_eq!(buf.push_terminated(b"ab").unwrap(), 3);
        assert_eq!(buf, vec![0xaa, b'a', b'b', 0x00]);
    }

    #[test]
    fn counter_agrees() {
        let mut sink: ByteCounter = Target::create();
        assert_eq!(sink.push_prefixed(&[0u8; 200]), 202);
    }
}
