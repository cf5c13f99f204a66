//! Owned output buffers
//!
//! A [`Builder`] is a [`Target`] that owns the bytes written to it and can
//! hand them back once encoding is complete. The only builder this crate
//! provides is [`StrictBuilder`](strict::StrictBuilder), which is the
//! write side of the byte stream every top-level encode call drives.

use crate::conv::target::Target;

pub mod strict;

/// Trait for owned, growable byte buffers
pub trait Builder
where
    Self: Target + Sized,
{
    /// Type suitable for presenting the finalized contents of a `Builder` object
    type Final: Into<Vec<u8>>;

    /// Converts a `Self` value into a `Self::Final` value once
    /// it is fully built.
    fn finalize(self) -> Self::Final;

    /// Returns the number of bytes written so far
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the Builder object and return a vector of its contents
    fn into_vec(self) -> Vec<u8> {
        self.finalize().into()
    }

    /// Consume the Builder object and return its contents as lowercase hex
    fn into_hex(self) -> String {
        hex::encode(self.into_vec())
    }
}
