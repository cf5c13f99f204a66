//! Fixed-width scalars
//!
//! Integers and floats are written as the raw little-endian bytes of their
//! exact width, booleans as a single `0x01` or `0x00`, and `()` as nothing.

use crate::conv::{target::Target, Decode, Encode};
use crate::parse::error::ParseResult;
use crate::parse::Parser;

impl Encode for () {
    fn write_to<U: Target>(&self, _: &mut U) -> usize {
        0
    }

    #[inline(always)]
    fn write_to_vec(&self, _: &mut Vec<u8>) {}

    #[inline(always)]
    fn to_bytes(&self) -> Vec<u8> {
        Vec::new()
    }
}

impl Decode for () {
    #[inline]
    fn parse<P: Parser>(_: &mut P) -> ParseResult<()> {
        Ok(())
    }
}

impl Encode for bool {
    fn write_to<U: Target>(&self, buf: &mut U) -> usize {
        buf.push_one(u8::from(*self)) + buf.resolve_zero()
    }
}

impl Decode for bool {
    fn parse<P: Parser>(p: &mut P) -> ParseResult<Self> {
        p.take_bool()
    }
}

macro_rules! impl_le_scalar {
    ($($t:ty => $take:ident),+ $(,)?) => {
        $(
            impl Encode for $t {
                #[inline]
                fn write_to<U: Target>(&self, buf: &mut U) -> usize {
                    buf.push_many(self.to_le_bytes()) + buf.resolve_zero()
                }
            }

            impl Decode for $t {
                #[inline]
                fn parse<P: Parser>(p: &mut P) -> ParseResult<Self> {
                    p.$take()
                }
            }
        )+
    };
}

impl_le_scalar!(
    u8 => take_u8,
    u16 => take_u16,
    u32 => take_u32,
    u64 => take_u64,
    i8 => take_i8,
    i16 => take_i16,
    i32 => take_i32,
    i64 => take_i64,
    f32 => take_f32,
    f64 => take_f64,
);
