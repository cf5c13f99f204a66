//! Builder type implemented as a newtype around `Vec<u8>`
//!
//! StrictBuilder is named after Haskell's `Data.ByteString.Strict`.

use std::borrow::Borrow;

use crate::conv::target::Target;

/// Newtype around `Vec<u8>` used as the write cursor of a single encode call
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Default)]
#[repr(transparent)]
pub struct StrictBuilder(Vec<u8>);

impl StrictBuilder {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Returns the bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Discards everything written after the first `len` bytes.
    ///
    /// Used to roll back a partially written value after a failed encode.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len)
    }
}

impl std::fmt::Debug for StrictBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StrictBuilder({})", hex::encode(&self.0))
    }
}

impl Borrow<[u8]> for StrictBuilder {
    fn borrow(&self) -> &[u8] {
        self.0.borrow()
    }
}

impl From<StrictBuilder> for Vec<u8> {
    fn from(val: StrictBuilder) -> Self {
        val.0
    }
}

impl From<Vec<u8>> for StrictBuilder {
    fn from(buf: Vec<u8>) -> StrictBuilder {
        StrictBuilder(buf)
    }
}

impl std::io::Write for StrictBuilder {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Target for StrictBuilder {
    fn anticipate(&mut self, extra: usize) {
        self.0.anticipate(extra)
    }

    fn create() -> Self {
        Self(Vec::create())
    }

    fn push_one(&mut self, b: u8) -> usize {
        self.0.push_one(b)
    }

    fn push_many<const N: usize>(&mut self, arr: [u8; N]) -> usize {
        self.0.push_many(arr)
    }

    fn push_all(&mut self, buf: &[u8]) -> usize {
        self.0.push_all(buf)
    }
}

impl super::Builder for StrictBuilder {
    /// In order to distinguish between finalized and non-finalized
    /// `StrictBuilders`, `Final := Vec<u8>` is used over `Final := Self`
    type Final = Vec<u8>;

    fn finalize(self) -> Self::Final {
        self.0
    }

    fn len(&self) -> usize {
        Vec::len(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Builder;

    #[test]
    fn hex_and_rollback() {
        let mut b = StrictBuilder::from(vec![0xde, 0xad]);
        let mark = b.len();
        b.push_many([0xbe, 0xef]);
        assert_eq!(b.clone().into_hex(), "deadbeef");
        b.truncate(mark);
        assert_eq!(b.into_vec(), vec![0xde, 0xad]);
        assert!(StrictBuilder::new().is_empty());
    }
}
