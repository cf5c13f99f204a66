//! Variable-length quantities
//!
//! Integers are split into 7-bit groups, least-significant group first, with
//! the high bit of every byte but the last set to mark that more follow. The
//! signed variants pass through the zig-zag transform first, so that values
//! of small magnitude stay short regardless of sign.
//!
//! Fixed-width classes (`v8`..`v64`, `w8`..`w64`) run over machine integers.
//! The unbounded classes [`N`] and [`Z`] run over `num-bigint` values and
//! place no limit on the number of groups.

use crate::conv::target::Target;
use crate::conv::{Decode, Encode};
use crate::parse::error::ParseResult;
use crate::parse::Parser;

/// Maximum number of bytes a 64-bit magnitude can occupy
pub const MAX_VLQ_BYTES: usize = 10;

/// Maps a signed integer onto the naturals, interleaving signs so that
/// `0, -1, 1, -2, 2, ...` become `0, 1, 2, 3, 4, ...`
#[inline]
#[must_use]
pub const fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag`]
#[inline]
#[must_use]
pub const fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Serializes `value` into a stack buffer, returning the buffer and the
/// number of bytes used.
#[must_use]
pub fn encode_u64(mut value: u64) -> ([u8; MAX_VLQ_BYTES], usize) {
    let mut out = [0u8; MAX_VLQ_BYTES];
    let mut len = 0;
    loop {
        let group = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out[len] = group;
            len += 1;
            break (out, len);
        }
        out[len] = group | 0x80;
        len += 1;
    }
}

/// Number of bytes the VLQ serialization of `value` occupies
#[must_use]
pub fn encoded_len(value: u64) -> usize {
    let bits = (64 - value.leading_zeros()).max(1) as usize;
    num_integer::Integer::div_ceil(&bits, &7)
}

/// Number of VLQ bytes permitted for a magnitude of at most `max_bits` bits
#[inline]
#[must_use]
pub fn max_groups(max_bits: u32) -> usize {
    num_integer::Integer::div_ceil(&(max_bits as usize), &7)
}

pub use n::N;
pub use z::Z;

/// Arbitrary-precision natural encoded as an unbounded unsigned VLQ
pub mod n {
    use std::fmt::Display;

    use num_bigint::BigUint;

    use super::*;

    #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Default)]
    #[repr(transparent)]
    pub struct N(pub BigUint);

    impl N {
        pub fn into_inner(self) -> BigUint {
            self.0
        }

        pub(crate) fn from_groups(groups: &[u8]) -> Self {
            let lo7: Vec<u8> = groups.iter().map(|b| b & 0x7f).collect();
            // every digit is < 0x80 after masking, so conversion cannot fail
            Self(BigUint::from_radix_le(&lo7, 0x80).unwrap_or_default())
        }

        pub(crate) fn to_groups(&self) -> Vec<u8> {
            if self.0.bits() == 0 {
                return vec![0];
            }
            let mut ret = self.0.to_radix_le(0x80);

            // Pre-emptively set the high bit of the final byte so that
            // toggling every byte leaves it clear and all others set.
            if let Some(last) = ret.last_mut() {
                *last ^= 0x80;
            }
            for byt in ret.iter_mut() {
                *byt ^= 0x80
            }
            ret
        }
    }

    impl std::fmt::Debug for N {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, r#"ℕ({})"#, &self.0)
        }
    }

    impl Display for N {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            <BigUint as Display>::fmt(&self.0, f)
        }
    }

    impl From<BigUint> for N {
        fn from(value: BigUint) -> Self {
            Self(value)
        }
    }

    impl Encode for N {
        fn write_to<U: Target>(&self, buf: &mut U) -> usize {
            buf.push_all(&self.to_groups()) + buf.resolve_zero()
        }
    }

    impl Decode for N {
        fn parse<P: Parser>(p: &mut P) -> ParseResult<Self> {
            Ok(Self::from_groups(&p.take_vlq_groups(None)?))
        }
    }

}

/// Arbitrary-precision integer encoded as an unbounded zig-zag VLQ
pub mod z {
    use std::fmt::Display;

    use num_bigint::{BigInt, BigUint, Sign};

    use super::n::N;
    use super::*;

    #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Default)]
    #[repr(transparent)]
    pub struct Z(pub BigInt);

    impl Z {
        pub fn into_inner(self) -> BigInt {
            self.0
        }

        /// Zig-zag image of the held integer: `2n` for `n >= 0`, `-2n - 1` otherwise
        pub fn zigzag(&self) -> BigUint {
            let mag = self.0.magnitude() << 1u8;
            match self.0.sign() {
                Sign::Minus => mag - 1u8,
                _ => mag,
            }
        }

        /// Inverse of [`zigzag`](Self::zigzag)
        pub fn unzigzag(nat: BigUint) -> Self {
            if nat.bit(0) {
                let mag: BigUint = (nat + 1u8) >> 1u8;
                Self(BigInt::from_biguint(Sign::Minus, mag))
            } else {
                Self(BigInt::from_biguint(Sign::Plus, nat >> 1u8))
            }
        }
    }

    impl std::fmt::Debug for Z {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "\u{2124}({})", &self.0)
        }
    }

    impl Display for Z {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            <BigInt as Display>::fmt(&self.0, f)
        }
    }

    impl From<BigInt> for Z {
        fn from(value: BigInt) -> Self {
            Self(value)
        }
    }

    impl Encode for Z {
        fn write_to<U: Target>(&self, buf: &mut U) -> usize {
            N(self.zigzag()).write_to(buf)
        }
    }

    impl Decode for Z {
        fn parse<P: Parser>(p: &mut P) -> ParseResult<Self> {
            Ok(Self::unzigzag(N::parse(p)?.into_inner()))
        }
    }

}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn three_hundred() {
        let (buf, len) = encode_u64(300);
        assert_eq!(&buf[..len], &[0xac, 0x02]);
        assert_eq!(encoded_len(300), 2);
        assert_eq!(encoded_len(0), 1);
        assert_eq!(encoded_len(u64::MAX), MAX_VLQ_BYTES);
    }

    #[test]
    fn zigzag_small_values() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(zigzag(i64::MIN), u64::MAX);
    }

    proptest! {
        #[test]
        fn zigzag_bijective(n in any::<i64>()) {
            prop_assert_eq!(unzigzag(zigzag(n)), n);
        }

        #[test]
        fn encoded_len_agrees(n in any::<u64>()) {
            let (_, len) = encode_u64(n);
            prop_assert_eq!(len, encoded_len(n));
        }
    }
}
