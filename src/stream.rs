//! Multi-value streams
//!
//! Values written by an [`Encoder`] are laid end to end with no separator,
//! so a [`Decoder`] must be driven with the same sequence of descriptors.

use std::io::Write;

use crate::builder::strict::StrictBuilder;
use crate::error::Result;
use crate::parse::error::{DecodeErrorKind, ParseResult};
use crate::parse::{ByteParser, Parser};
use crate::registry::FormatRegistry;
use crate::schema::TypeDescriptor;
use crate::value::Value;

/// Appends successive values to a sink
pub struct Encoder<'r, W: Write> {
    registry: &'r FormatRegistry,
    sink: W,
    scratch: StrictBuilder,
}

impl<'r, W: Write> Encoder<'r, W> {
    pub(crate) fn new(registry: &'r FormatRegistry, sink: W) -> Self {
        Self {
            registry,
            sink,
            scratch: StrictBuilder::new(),
        }
    }

    /// Encodes `value` and writes it to the sink, returning the number of
    /// bytes written.
    ///
    /// Nothing reaches the sink unless the whole value encodes.
    pub fn dump(&mut self, value: &Value, descriptor: &TypeDescriptor) -> Result<usize> {
        let codec = self.registry.resolve(descriptor)?;
        self.scratch.truncate(0);
        codec.encode(self.registry, value, &mut self.scratch)?;
        self.sink.write_all(self.scratch.as_slice())?;
        Ok(self.scratch.as_slice().len())
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.sink.flush()?)
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Reads successive values from one buffer
pub struct Decoder<'r, 'a> {
    registry: &'r FormatRegistry,
    parser: ByteParser<'a>,
}

impl<'r, 'a> Decoder<'r, 'a> {
    pub(crate) fn new(registry: &'r FormatRegistry, bytes: &'a [u8]) -> Self {
        Self {
            registry,
            parser: ByteParser::new(bytes),
        }
    }

    /// Decodes the next value.
    ///
    /// Fails with `Exhausted` if no bytes remain, and with `UnexpectedEof`
    /// if the input ends partway through the value.
    pub fn load(&mut self, descriptor: &TypeDescriptor) -> Result<Value> {
        let codec = self.registry.resolve(descriptor)?;
        if self.parser.is_exhausted() {
            return Err(self.parser.fail(DecodeErrorKind::Exhausted).into());
        }
        Ok(codec.decode(self.registry, &mut self.parser)?)
    }

    /// Decodes values of one shape until the input runs out.
    ///
    /// The iterator stops after yielding the first error, or after a value
    /// that consumed no input, since a zero-width shape would otherwise
    /// repeat without end.
    pub fn iter<'d>(&'d mut self, descriptor: &'d TypeDescriptor) -> Values<'d, 'r, 'a> {
        Values {
            decoder: self,
            descriptor,
            done: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.parser.is_exhausted()
    }

    pub fn offset(&self) -> usize {
        self.parser.offset()
    }

    /// Consumes the decoder, failing with `TrailingBytes` if input remains
    pub fn finish(self) -> ParseResult<()> {
        self.parser.finish()
    }
}

/// Iterator returned by [`Decoder::iter`]
pub struct Values<'d, 'r, 'a> {
    decoder: &'d mut Decoder<'r, 'a>,
    descriptor: &'d TypeDescriptor,
    done: bool,
}

impl Iterator for Values<'_, '_, '_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.decoder.is_exhausted() {
            return None;
        }
        let before = self.decoder.offset();
        let next = self.decoder.load(self.descriptor);
        self.done = next.is_err() || self.decoder.offset() == before;
        Some(next)
    }
}
