//! Resolved codecs
//!
//! A [`Codec`] is the paired encode/decode procedure the registry resolves a
//! [`TypeDescriptor`](crate::schema::TypeDescriptor) into. Codecs are plain
//! data: they hold no per-call state, are built once per distinct shape, and
//! are shared behind `Arc` between every caller of that shape.
//!
//! Encoding writes into a [`StrictBuilder`] and can only fail through caller
//! misuse ([`UsageError`](crate::error::UsageError)). Decoding reads from a
//! [`ByteParser`] and can only fail through malformed input
//! ([`DecodeError`](crate::parse::error::DecodeError)); nested failures are
//! annotated with the path of the shape that failed as they propagate.
//!
//! The leaf, composite, record and blob shapes live in the submodules of the
//! same names.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::builder::strict::StrictBuilder;
use crate::error::UsageResult;
use crate::format::Format;
use crate::parse::error::ParseResult;
use crate::parse::ByteParser;
use crate::registry::{CustomCodec, FormatRegistry};
use crate::value::Value;

pub mod blob;
pub mod composite;
pub mod primitive;
pub mod record;

pub use record::RecordCodec;

/// Character encoding of a text payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Length-prefixed UTF-8
    Utf8,
    /// Length-prefixed UTF-16 with a byte-order mark
    Utf16,
    /// UTF-8 followed by a single `0x00`
    Terminated,
}

/// Which list-like value a counted sequence decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqKind {
    List,
    Set,
    FrozenSet,
    /// Variadic tuple
    Tuple,
}

/// Shared handle on a registered [`CustomCodec`]
#[derive(Clone)]
pub struct CustomRef(pub(crate) Arc<dyn CustomCodec>);

impl Debug for CustomRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustomCodec")
    }
}

/// Encode/decode procedure bound to one resolved shape
#[derive(Debug, Clone)]
pub enum Codec {
    /// Zero bytes; decodes to the held constant
    Constant(Value),
    Bool,
    /// Raw little-endian integer (`u8`..`u64`, `i8`..`i64`)
    Fixed(Format),
    /// Raw IEEE float (`f32`, `f64`)
    Float(Format),
    /// Bounded VLQ (`v8`..`v64`, `w8`..`w64`)
    Vlq(Format),
    /// Unbounded VLQ over arbitrary-precision integers
    BigVlq { signed: bool },
    /// Real part, then imaginary part
    Complex(Format),
    Bytes,
    NtBytes,
    Text { encoding: TextEncoding, path: bool },
    Optional(Arc<Codec>),
    Union(Vec<Arc<Codec>>),
    Seq { kind: SeqKind, elem: Arc<Codec> },
    Deque { bound: Arc<Codec>, elem: Arc<Codec> },
    Dict { key: Arc<Codec>, value: Arc<Codec> },
    Tuple(Vec<Arc<Codec>>),
    /// Choice among two or more constants
    Literal(Vec<Value>),
    Record(RecordCodec),
    Custom { key: String, codec: CustomRef },
    LateBound,
    /// JSON text; `raw` codecs carry [`Value::Json`], others any value tree
    Json { raw: bool },
    Blob,
}

impl Codec {
    /// Appends the encoding of `value` to `out`.
    ///
    /// On failure, `out` may hold a partial encoding; callers that keep the
    /// buffer must roll it back.
    pub fn encode(
        &self,
        reg: &FormatRegistry,
        value: &Value,
        out: &mut StrictBuilder,
    ) -> UsageResult<()> {
        match self {
            Codec::Constant(c) => primitive::encode_constant(c, value),
            Codec::Bool => primitive::encode_bool(value, out),
            Codec::Fixed(f) | Codec::Vlq(f) => primitive::encode_int(*f, value, out),
            Codec::Float(f) => primitive::encode_float(*f, value, out),
            Codec::BigVlq { signed } => primitive::encode_big(*signed, value, out),
            Codec::Complex(f) => primitive::encode_complex(*f, value, out),
            Codec::Bytes => primitive::encode_bytes(false, value, out),
            Codec::NtBytes => primitive::encode_bytes(true, value, out),
            Codec::Text { encoding, path } => primitive::encode_text(*encoding, *path, value, out),
            Codec::Optional(inner) => composite::encode_optional(reg, inner, value, out),
            Codec::Union(variants) => composite::encode_union(reg, variants, value, out),
            Codec::Seq { kind, elem } => composite::encode_seq(reg, *kind, elem, value, out),
            Codec::Deque { bound, elem } => composite::encode_deque(reg, bound, elem, value, out),
            Codec::Dict { key, value: val } => composite::encode_dict(reg, key, val, value, out),
            Codec::Tuple(elems) => composite::encode_tuple(reg, elems, value, out),
            Codec::Literal(consts) => composite::encode_literal(consts, value, out),
            Codec::Record(rec) => rec.encode(reg, value, out),
            Codec::Custom { codec, .. } => codec.0.encode(value, out),
            Codec::LateBound => blob::encode_late_bound(reg, value, out),
            Codec::Json { raw } => blob::encode_json(*raw, value, out),
            Codec::Blob => blob::encode_binary(value, out),
        }
    }

    /// Consumes exactly the bytes of one encoded value and returns it.
    pub fn decode(&self, reg: &FormatRegistry, p: &mut ByteParser<'_>) -> ParseResult<Value> {
        match self {
            Codec::Constant(c) => Ok(c.clone()),
            Codec::Bool => primitive::decode_bool(p),
            Codec::Fixed(f) | Codec::Vlq(f) => primitive::decode_int(*f, p),
            Codec::Float(f) => primitive::decode_float(*f, p),
            Codec::BigVlq { signed } => primitive::decode_big(*signed, p),
            Codec::Complex(f) => primitive::decode_complex(*f, p),
            Codec::Bytes => primitive::decode_bytes(false, p),
            Codec::NtBytes => primitive::decode_bytes(true, p),
            Codec::Text { encoding, path } => primitive::decode_text(*encoding, *path, p),
            Codec::Optional(inner) => composite::decode_optional(reg, inner, p),
            Codec::Union(variants) => composite::decode_union(reg, variants, p),
            Codec::Seq { kind, elem } => composite::decode_seq(reg, *kind, elem, p),
            Codec::Deque { bound, elem } => composite::decode_deque(reg, bound, elem, p),
            Codec::Dict { key, value } => composite::decode_dict(reg, key, value, p),
            Codec::Tuple(elems) => composite::decode_tuple(reg, elems, p),
            Codec::Literal(consts) => composite::decode_literal(consts, p),
            Codec::Record(rec) => rec.decode(reg, p),
            Codec::Custom { key, codec } => {
                use crate::parse::error::{PathSegment, ResultExt};
                codec.0.decode(p).within(|| PathSegment::Type(key.clone()))
            }
            Codec::LateBound => blob::decode_late_bound(reg, p),
            Codec::Json { raw } => blob::decode_json(*raw, p),
            Codec::Blob => blob::decode_binary(p),
        }
    }

    /// Checks whether `value` has the shape this codec writes, looking
    /// through containers down to their leaves.
    ///
    /// Unions try the variants that accept a value in declared order.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Codec::Constant(c), v) => c == v,
            (Codec::Bool, Value::Bool(_)) => true,
            (Codec::Fixed(f) | Codec::Vlq(f), Value::Int(n)) => f
                .int_range()
                .map_or(false, |(lo, hi)| (lo..=hi).contains(n)),
            (Codec::BigVlq { signed: true }, Value::Int(_) | Value::BigInt(_)) => true,
            (Codec::BigVlq { signed: false }, Value::Int(n)) => *n >= 0,
            (Codec::BigVlq { signed: false }, Value::BigInt(n)) => {
                n.sign() != num_bigint::Sign::Minus
            }
            (Codec::Float(_), Value::Float(_)) => true,
            (Codec::Complex(_), Value::Complex { .. }) => true,
            (Codec::Bytes | Codec::NtBytes, Value::Bytes(_)) => true,
            (Codec::Text { path: false, .. }, Value::Text(_)) => true,
            (Codec::Text { path: true, .. }, Value::Path(_)) => true,
            (Codec::Optional(inner), v) => v.is_none() || inner.accepts(v),
            (Codec::Union(variants), v) => variants.iter().any(|c| c.accepts(v)),
            (Codec::Seq { kind, elem }, v) => composite::seq_items(*kind, v)
                .map_or(false, |xs| xs.iter().all(|x| elem.accepts(x))),
            (Codec::Deque { bound, elem }, Value::Deque { maxlen, items }) => {
                bound.accepts(&Value::from(*maxlen)) && items.iter().all(|x| elem.accepts(x))
            }
            (Codec::Dict { key, value }, Value::Dict(entries)) => entries
                .iter()
                .all(|(k, v)| key.accepts(k) && value.accepts(v)),
            (Codec::Tuple(elems), Value::Tuple(xs)) => {
                elems.len() == xs.len() && elems.iter().zip(xs).all(|(c, x)| c.accepts(x))
            }
            (Codec::Literal(consts), v) => consts.contains(v),
            (Codec::Record(rec), Value::Record(r)) => rec.accepts(r),
            (Codec::Custom { codec, .. }, v) => codec.0.accepts(v),
            (Codec::LateBound, Value::Tagged { .. }) => true,
            (Codec::Json { raw: true }, Value::Json(_)) => true,
            (Codec::Json { raw: false }, _) | (Codec::Blob, _) => true,
            _ => false,
        }
    }

    /// Fewest bytes any encoding of this shape can occupy.
    ///
    /// Custom codecs are taken to possibly write nothing.
    pub fn min_width(&self) -> usize {
        match self {
            Codec::Constant(_) | Codec::Custom { .. } => 0,
            Codec::Fixed(f) | Codec::Float(f) => f.fixed_width().unwrap_or(1),
            Codec::Complex(f) => 2 * f.fixed_width().unwrap_or(1),
            Codec::Deque { bound, .. } => bound.min_width() + 1,
            Codec::Tuple(elems) => elems.iter().map(|c| c.min_width()).sum(),
            Codec::Record(rec) => rec.min_width(),
            Codec::Bool
            | Codec::Vlq(_)
            | Codec::BigVlq { .. }
            | Codec::Bytes
            | Codec::NtBytes
            | Codec::Text { .. }
            | Codec::Optional(_)
            | Codec::Union(_)
            | Codec::Seq { .. }
            | Codec::Dict { .. }
            | Codec::Literal(_)
            | Codec::LateBound
            | Codec::Json { .. }
            | Codec::Blob => 1,
        }
    }
}
