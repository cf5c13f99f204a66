//! Composite shapes
//!
//! Each shape is composed from the codecs of its parts. Counts and variant
//! indices are unsigned VLQs; fixed tuples carry no count at all.
//!
//! A decoded count is checked against the input before anything is read:
//! elements that occupy at least one byte cannot outnumber the bytes left,
//! and elements that may occupy none are capped at
//! [`ZERO_WIDTH_COUNT_LIMIT`].

use std::sync::Arc;

use super::{Codec, SeqKind};
use crate::builder::strict::StrictBuilder;
use crate::builder::Builder;
use crate::conv::target::Target;
use crate::error::{UsageError, UsageResult};
use crate::parse::error::{DecodeError, DecodeErrorKind, ParseResult, PathSegment, ResultExt};
use crate::parse::{ByteParser, Parser};
use crate::registry::FormatRegistry;
use crate::value::Value;

/// Largest count accepted for a sequence or dict whose elements may encode
/// to zero bytes
pub const ZERO_WIDTH_COUNT_LIMIT: u64 = 1 << 16;

pub(crate) fn encode_optional(
    reg: &FormatRegistry,
    inner: &Codec,
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    if value.is_none() {
        out.push_one(0x00);
        Ok(())
    } else {
        out.push_one(0x01);
        inner.encode(reg, value, out)
    }
}

pub(crate) fn decode_optional(
    reg: &FormatRegistry,
    inner: &Codec,
    p: &mut ByteParser<'_>,
) -> ParseResult<Value> {
    if p.take_bool()? {
        inner.decode(reg, p)
    } else {
        Ok(Value::None)
    }
}

/// Reads a VLQ selector and checks it against the number of alternatives
fn take_index(p: &mut ByteParser<'_>, count: usize) -> ParseResult<usize> {
    let start = p.offset();
    let index = p.take_vlq(64)?;
    match usize::try_from(index) {
        Ok(ix) if ix < count => Ok(ix),
        _ => Err(DecodeError::new(
            DecodeErrorKind::InvalidVariantIndex { index, count },
            start,
        )),
    }
}

pub(crate) fn encode_union(
    reg: &FormatRegistry,
    variants: &[Arc<Codec>],
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    let mark = out.len();
    let mut first_err = None;
    for (ix, codec) in variants.iter().enumerate().filter(|(_, c)| c.accepts(value)) {
        out.push_vlq(ix as u64);
        match codec.encode(reg, value, out) {
            Ok(()) => return Ok(()),
            Err(e) => {
                out.truncate(mark);
                first_err.get_or_insert(e);
            }
        }
    }
    Err(first_err.unwrap_or_else(|| {
        UsageError::NoMatchingVariant(format!(
            "union of {} variants ({})",
            variants.len(),
            value.type_name()
        ))
    }))
}

pub(crate) fn decode_union(
    reg: &FormatRegistry,
    variants: &[Arc<Codec>],
    p: &mut ByteParser<'_>,
) -> ParseResult<Value> {
    let ix = take_index(p, variants.len())?;
    variants[ix]
        .decode(reg, p)
        .within(|| PathSegment::Variant(ix as u64))
}

pub(crate) fn seq_items(kind: SeqKind, value: &Value) -> Option<&[Value]> {
    match (kind, value) {
        (SeqKind::List, Value::List(xs))
        | (SeqKind::Set, Value::Set(xs))
        | (SeqKind::FrozenSet, Value::FrozenSet(xs))
        | (SeqKind::Tuple, Value::Tuple(xs)) => Some(xs),
        _ => None,
    }
}

fn encode_items(
    reg: &FormatRegistry,
    elem: &Codec,
    items: &[Value],
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    out.push_vlq(items.len() as u64);
    items.iter().try_for_each(|x| elem.encode(reg, x, out))
}

/// Reads an element count and checks that the rest of the input could
/// hold that many elements of at least `min_width` bytes each
fn take_count(p: &mut ByteParser<'_>, min_width: usize) -> ParseResult<usize> {
    let start = p.offset();
    let count = p.take_vlq(64)?;
    let limit = match min_width {
        0 => ZERO_WIDTH_COUNT_LIMIT,
        w => (p.remainder() / w) as u64,
    };
    if count > limit {
        let msg = if min_width == 0 {
            format!("count {count} of zero-width elements exceeds {limit}")
        } else {
            format!("count {count} exceeds the {limit} elements the remaining input can hold")
        };
        return Err(DecodeError::new(DecodeErrorKind::Rejected(msg), start));
    }
    Ok(count as usize)
}

fn decode_items(
    reg: &FormatRegistry,
    elem: &Codec,
    p: &mut ByteParser<'_>,
) -> ParseResult<Vec<Value>> {
    let count = take_count(p, elem.min_width())?;
    let mut items = Vec::with_capacity(count.min(p.remainder()));
    for ix in 0..count {
        items.push(elem.decode(reg, p).within(|| PathSegment::Index(ix))?);
    }
    Ok(items)
}

/// Keeps the first occurrence of each element
fn dedup_first(items: Vec<Value>) -> Vec<Value> {
    let mut ret: Vec<Value> = Vec::with_capacity(items.len());
    for x in items {
        if !ret.contains(&x) {
            ret.push(x);
        }
    }
    ret
}

pub(crate) fn encode_seq(
    reg: &FormatRegistry,
    kind: SeqKind,
    elem: &Codec,
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    let items = seq_items(kind, value).ok_or_else(|| {
        UsageError::mismatch(format_args!("{kind:?}"), value)
    })?;
    encode_items(reg, elem, items, out)
}

pub(crate) fn decode_seq(
    reg: &FormatRegistry,
    kind: SeqKind,
    elem: &Codec,
    p: &mut ByteParser<'_>,
) -> ParseResult<Value> {
    let items = decode_items(reg, elem, p)?;
    Ok(match kind {
        SeqKind::List => Value::List(items),
        SeqKind::Set => Value::Set(dedup_first(items)),
        SeqKind::FrozenSet => Value::FrozenSet(dedup_first(items)),
        SeqKind::Tuple => Value::Tuple(items),
    })
}

pub(crate) fn encode_deque(
    reg: &FormatRegistry,
    bound: &Codec,
    elem: &Codec,
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    match value {
        Value::Deque { maxlen, items } => {
            bound.encode(reg, &Value::from(*maxlen), out)?;
            encode_items(reg, elem, items, out)
        }
        other => Err(UsageError::mismatch("deque", other)),
    }
}

pub(crate) fn decode_deque(
    reg: &FormatRegistry,
    bound: &Codec,
    elem: &Codec,
    p: &mut ByteParser<'_>,
) -> ParseResult<Value> {
    let start = p.offset();
    let reject = |msg: String| DecodeError::new(DecodeErrorKind::Rejected(msg), start);
    let maxlen = match bound.decode(reg, p)? {
        Value::Int(n) => Some(u64::try_from(n).map_err(|_| reject(format!("deque bound {n}")))?),
        Value::BigInt(n) => {
            Some(u64::try_from(&n).map_err(|_| reject(format!("deque bound {n}")))?)
        }
        _ => None,
    };
    let items = decode_items(reg, elem, p)?;
    if let Some(max) = maxlen {
        if items.len() as u64 > max {
            return Err(reject(format!(
                "deque holds {} items but is bounded at {max}",
                items.len()
            )));
        }
    }
    Ok(Value::Deque { maxlen, items })
}

pub(crate) fn encode_dict(
    reg: &FormatRegistry,
    key: &Codec,
    val: &Codec,
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    let entries = match value {
        Value::Dict(entries) => entries,
        other => return Err(UsageError::mismatch("dict", other)),
    };
    out.push_vlq(entries.len() as u64);
    for (k, v) in entries {
        key.encode(reg, k, out)?;
        val.encode(reg, v, out)?;
    }
    Ok(())
}

pub(crate) fn decode_dict(
    reg: &FormatRegistry,
    key: &Codec,
    val: &Codec,
    p: &mut ByteParser<'_>,
) -> ParseResult<Value> {
    let count = take_count(p, key.min_width() + val.min_width())?;
    let mut entries: Vec<(Value, Value)> = Vec::with_capacity(count.min(p.remainder()));
    for ix in 0..count {
        let k = key.decode(reg, p).within(|| PathSegment::Key(ix))?;
        let v = val.decode(reg, p).within(|| PathSegment::Entry(ix))?;
        // a repeated key keeps its first position and its last value
        match entries.iter_mut().find(|(existing, _)| *existing == k) {
            Some(slot) => slot.1 = v,
            None => entries.push((k, v)),
        }
    }
    Ok(Value::Dict(entries))
}

pub(crate) fn encode_tuple(
    reg: &FormatRegistry,
    elems: &[Arc<Codec>],
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    match value {
        Value::Tuple(xs) if xs.len() == elems.len() => elems
            .iter()
            .zip(xs)
            .try_for_each(|(c, x)| c.encode(reg, x, out)),
        other => Err(UsageError::mismatch(
            format_args!("tuple of {}", elems.len()),
            other,
        )),
    }
}

pub(crate) fn decode_tuple(
    reg: &FormatRegistry,
    elems: &[Arc<Codec>],
    p: &mut ByteParser<'_>,
) -> ParseResult<Value> {
    elems
        .iter()
        .enumerate()
        .map(|(ix, c)| c.decode(reg, p).within(|| PathSegment::Index(ix)))
        .collect::<ParseResult<Vec<_>>>()
        .map(Value::Tuple)
}

pub(crate) fn encode_literal(
    consts: &[Value],
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    let ix = consts.iter().position(|c| c == value).ok_or_else(|| {
        UsageError::NoMatchingVariant(format!("literal of {} values", consts.len()))
    })?;
    out.push_vlq(ix as u64);
    Ok(())
}

pub(crate) fn decode_literal(consts: &[Value], p: &mut ByteParser<'_>) -> ParseResult<Value> {
    let ix = take_index(p, consts.len())?;
    Ok(consts[ix].clone())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::TextEncoding;
    use crate::format::Format;

    fn int() -> Arc<Codec> {
        Arc::new(Codec::Vlq(Format::W64))
    }

    fn text() -> Arc<Codec> {
        Arc::new(Codec::Text {
            encoding: TextEncoding::Utf8,
            path: false,
        })
    }

    fn round_trip(codec: &Codec, value: &Value) -> Vec<u8> {
        let reg = FormatRegistry::new();
        let mut out = StrictBuilder::new();
        codec.encode(&reg, value, &mut out).unwrap();
        let bytes = out.into_vec();
        let mut p = ByteParser::new(&bytes);
        assert_eq!(&codec.decode(&reg, &mut p).unwrap(), value);
        assert!(p.is_exhausted());
        bytes
    }

    #[test]
    fn optional_presence() {
        let codec = Codec::Optional(int());
        assert_eq!(round_trip(&codec, &Value::None), vec![0x00]);
        assert_eq!(round_trip(&codec, &Value::Int(5)), vec![0x01, 0x0a]);
        let reg = FormatRegistry::new();
        let err = codec.decode(&reg, &mut ByteParser::new(&[0x02])).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::InvalidBool(0x02));
    }

    #[test]
    fn union_first_match_wins() {
        let codec = Codec::Union(vec![int(), text(), int()]);
        assert_eq!(round_trip(&codec, &Value::Int(1)), vec![0x00, 0x02]);
        assert_eq!(round_trip(&codec, &Value::from("a")), vec![0x01, 0x01, b'a']);
        let reg = FormatRegistry::new();
        let mut out = StrictBuilder::new();
        let err = codec.encode(&reg, &Value::Bool(true), &mut out).unwrap_err();
        assert!(matches!(err, UsageError::NoMatchingVariant(_)));
    }

    #[test]
    fn union_bad_index() {
        let codec = Codec::Union(vec![int(), text(), int()]);
        let reg = FormatRegistry::new();
        let err = codec.decode(&reg, &mut ByteParser::new(&[0x07])).unwrap_err();
        assert_eq!(
            err.kind(),
            &DecodeErrorKind::InvalidVariantIndex { index: 7, count: 3 }
        );
    }

    #[test]
    fn set_decode_dedups() {
        let codec = Codec::Seq {
            kind: SeqKind::Set,
            elem: int(),
        };
        let reg = FormatRegistry::new();
        let got = codec
            .decode(&reg, &mut ByteParser::new(&[0x03, 0x02, 0x04, 0x02]))
            .unwrap();
        assert_eq!(got, Value::Set(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn dict_last_value_wins() {
        let codec = Codec::Dict {
            key: text(),
            value: int(),
        };
        let bytes = [0x02, 0x01, b'k', 0x02, 0x01, b'k', 0x04];
        let reg = FormatRegistry::new();
        let got = codec.decode(&reg, &mut ByteParser::new(&bytes)).unwrap();
        assert_eq!(got, Value::Dict(vec![(Value::from("k"), Value::Int(2))]));
    }

    #[test]
    fn nested_error_path() {
        let codec = Codec::Seq {
            kind: SeqKind::List,
            elem: Arc::new(Codec::Bool),
        };
        let reg = FormatRegistry::new();
        let err = codec
            .decode(&reg, &mut ByteParser::new(&[0x03, 0x01, 0x00, 0x09]))
            .unwrap_err();
        assert_eq!(err.offset(), 3);
        assert_eq!(err.path().collect::<Vec<_>>(), vec![&PathSegment::Index(2)]);
    }

    #[test]
    fn fixed_tuple_has_no_count() {
        let codec = Codec::Tuple(vec![int(), text()]);
        let v = Value::Tuple(vec![Value::Int(-1), Value::from("x")]);
        assert_eq!(round_trip(&codec, &v), vec![0x01, 0x01, b'x']);
    }

    #[test]
    fn deque_bound() {
        let codec = Codec::Deque {
            bound: Arc::new(Codec::Optional(int())),
            elem: int(),
        };
        let v = Value::Deque {
            maxlen: Some(3),
            items: vec![Value::Int(1)],
        };
        assert_eq!(round_trip(&codec, &v), vec![0x01, 0x06, 0x01, 0x02]);
        let reg = FormatRegistry::new();
        let err = codec
            .decode(&reg, &mut ByteParser::new(&[0x01, 0x00, 0x01, 0x02]))
            .unwrap_err();
        assert!(matches!(err.kind(), DecodeErrorKind::Rejected(_)));
    }

    #[test]
    fn literal_index() {
        let codec = Codec::Literal(vec![Value::from("r"), Value::from("w")]);
        assert_eq!(round_trip(&codec, &Value::from("w")), vec![0x01]);
        let reg = FormatRegistry::new();
        let mut out = StrictBuilder::new();
        assert!(codec.encode(&reg, &Value::from("x"), &mut out).is_err());
    }

    #[test]
    fn union_looks_inside_containers() {
        let ints = Arc::new(Codec::Seq {
            kind: SeqKind::List,
            elem: int(),
        });
        let texts = Arc::new(Codec::Seq {
            kind: SeqKind::List,
            elem: text(),
        });
        let codec = Codec::Union(vec![ints, texts]);
        let v = Value::List(vec![Value::from("a")]);
        assert_eq!(round_trip(&codec, &v), vec![0x01, 0x01, 0x01, b'a']);
        assert_eq!(
            round_trip(&codec, &Value::List(vec![Value::Int(2)])),
            vec![0x00, 0x01, 0x04]
        );
    }

    #[test]
    fn union_rolls_back_a_failed_variant() {
        struct Greedy;
        impl crate::registry::CustomCodec for Greedy {
            fn encode(&self, _: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
                out.push_one(0xff);
                Err(UsageError::NoMatchingVariant("greedy".into()))
            }
            fn decode(&self, _: &mut ByteParser<'_>) -> ParseResult<Value> {
                Ok(Value::None)
            }
        }
        let greedy = Arc::new(Codec::Custom {
            key: "greedy".into(),
            codec: crate::codec::CustomRef(Arc::new(Greedy)),
        });
        let codec = Codec::Union(vec![greedy, int()]);
        let reg = FormatRegistry::new();
        let mut out = StrictBuilder::new();
        codec.encode(&reg, &Value::Int(3), &mut out).unwrap();
        assert_eq!(out.into_vec(), vec![0x01, 0x06]);
    }

    #[test]
    fn zero_width_count_is_capped() {
        let codec = Codec::Seq {
            kind: SeqKind::List,
            elem: Arc::new(Codec::Constant(Value::None)),
        };
        let reg = FormatRegistry::new();
        let err = codec
            .decode(&reg, &mut ByteParser::new(&[0x80, 0x80, 0x80, 0x02]))
            .unwrap_err();
        assert!(matches!(err.kind(), DecodeErrorKind::Rejected(_)));
        assert_eq!(err.offset(), 0);
        let got = codec.decode(&reg, &mut ByteParser::new(&[0x03])).unwrap();
        assert_eq!(got, Value::List(vec![Value::None; 3]));
    }

    #[test]
    fn count_beyond_input_fails_before_reading() {
        let codec = Codec::Dict {
            key: Arc::new(Codec::Constant(Value::None)),
            value: Arc::new(Codec::Fixed(Format::U32)),
        };
        let reg = FormatRegistry::new();
        let err = codec
            .decode(&reg, &mut ByteParser::new(&[0x03, 0, 0, 0, 0, 1, 1, 1, 1]))
            .unwrap_err();
        assert!(matches!(err.kind(), DecodeErrorKind::Rejected(_)));
        let zero_width = Codec::Dict {
            key: Arc::new(Codec::Constant(Value::None)),
            value: Arc::new(Codec::Constant(Value::Ellipsis)),
        };
        let err = zero_width
            .decode(&reg, &mut ByteParser::new(&[0xff, 0xff, 0xff, 0xff, 0x0f]))
            .unwrap_err();
        assert!(matches!(err.kind(), DecodeErrorKind::Rejected(_)));
    }

    #[test]
    fn deque_with_unbounded_bound() {
        let codec = Codec::Deque {
            bound: Arc::new(Codec::Optional(Arc::new(Codec::BigVlq { signed: true }))),
            elem: int(),
        };
        let reg = FormatRegistry::new();
        let got = codec
            .decode(&reg, &mut ByteParser::new(&[0x01, 0x06, 0x01, 0x02]))
            .unwrap();
        assert_eq!(
            got,
            Value::Deque {
                maxlen: Some(3),
                items: vec![Value::Int(1)]
            }
        );
    }
}
