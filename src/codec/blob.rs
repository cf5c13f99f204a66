//! Self-delimited blobs and late-bound tags
//!
//! These are the only shapes that carry type information on the wire. All
//! three are length-prefixed, so a decoder always consumes exactly the bytes
//! the encoder produced.
//!
//! # Trust
//!
//! A late-bound tag selects a codec by name from the registry catalogue,
//! and an opaque binary blob reconstructs an arbitrary value tree. Both
//! hand control of the decoded shape to the input. Only types registered
//! under the tag's key are ever dispatched to, and an unknown key is
//! malformed input, but callers decoding untrusted bytes should still avoid
//! descriptors containing either shape.

use std::sync::Arc;

use bincode::Options;

use super::Codec;
use crate::builder::strict::StrictBuilder;
use crate::conv::target::Target;
use crate::error::{UsageError, UsageResult};
use crate::parse::error::{DecodeError, DecodeErrorKind, ParseResult, PathSegment, ResultExt};
use crate::parse::{ByteParser, Parser};
use crate::registry::FormatRegistry;
use crate::value::Value;

fn binary_options() -> impl Options {
    bincode::DefaultOptions::new()
}

pub(crate) fn encode_binary(value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
    let bytes = binary_options()
        .serialize(value)
        .map_err(|e| UsageError::Blob(e.to_string()))?;
    out.push_prefixed(&bytes);
    Ok(())
}

pub(crate) fn decode_binary(p: &mut ByteParser<'_>) -> ParseResult<Value> {
    let start = p.offset();
    let bytes = p.take_prefixed()?;
    binary_options()
        .with_limit(bytes.len() as u64)
        .deserialize(bytes)
        .map_err(|e| DecodeError::new(DecodeErrorKind::MalformedBlob(e.to_string()), start))
}

pub(crate) fn encode_json(raw: bool, value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
    let text = match (raw, value) {
        (true, Value::Json(doc)) => serde_json::to_vec(doc),
        (true, other) => return Err(UsageError::mismatch("json document", other)),
        (false, v) => serde_json::to_vec(v),
    }
    .map_err(|e| UsageError::Blob(e.to_string()))?;
    out.push_prefixed(&text);
    Ok(())
}

pub(crate) fn decode_json(raw: bool, p: &mut ByteParser<'_>) -> ParseResult<Value> {
    let start = p.offset();
    let bytes = p.take_prefixed()?;
    let parsed = if raw {
        serde_json::from_slice(bytes).map(Value::Json)
    } else {
        serde_json::from_slice::<Value>(bytes)
    };
    parsed.map_err(|e| DecodeError::new(DecodeErrorKind::MalformedBlob(e.to_string()), start))
}

pub(crate) fn encode_late_bound(
    reg: &FormatRegistry,
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    let (key, inner) = match value {
        Value::Tagged { key, value } => (key, value),
        other => return Err(UsageError::mismatch("tagged value", other)),
    };
    let codec = reg
        .resolve_tag(key)?
        .ok_or_else(|| UsageError::NoCodecAvailable(key.clone()))?;
    out.push_prefixed(key.as_bytes());
    codec.encode(reg, inner, out)
}

/// An unknown key is an unresolved tag; a known key whose codec fails to
/// build is reported with the reason it failed
fn tag_codec(
    resolved: UsageResult<Option<Arc<Codec>>>,
    key: &str,
    start: usize,
) -> ParseResult<Arc<Codec>> {
    match resolved {
        Ok(Some(codec)) => Ok(codec),
        Ok(None) => Err(DecodeError::new(
            DecodeErrorKind::UnresolvedTypeTag(key.to_owned()),
            start,
        )),
        Err(e) => Err(DecodeError::new(
            DecodeErrorKind::Rejected(format!("type `{key}` cannot be resolved: {e}")),
            start,
        )),
    }
}

pub(crate) fn decode_late_bound(reg: &FormatRegistry, p: &mut ByteParser<'_>) -> ParseResult<Value> {
    let start = p.offset();
    let key = std::str::from_utf8(p.take_prefixed()?)
        .map(str::to_owned)
        .map_err(|e| DecodeError::new(DecodeErrorKind::InvalidText(e.to_string()), start))?;
    let codec = tag_codec(reg.resolve_tag(&key), &key, start)?;
    let value = codec
        .decode(reg, p)
        .within(|| PathSegment::Type(key.clone()))?;
    Ok(Value::Tagged {
        key,
        value: Box::new(value),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Record;
    use crate::Builder;
    use proptest::prelude::*;

    #[test]
    fn binary_blob_is_self_delimiting() {
        let v = Value::List(vec![
            Value::Int(-3),
            Value::Record(Record::new("P").with("x", 1.5f64)),
            Value::Json(serde_json::json!({"k": true})),
        ]);
        let mut out = StrictBuilder::new();
        encode_binary(&v, &mut out).unwrap();
        let mut bytes = out.into_vec();
        bytes.push(0xee);
        let mut p = ByteParser::new(&bytes);
        assert_eq!(decode_binary(&mut p).unwrap(), v);
        assert_eq!(p.remainder(), 1);
    }

    #[test]
    fn malformed_binary_blob() {
        let mut p = ByteParser::new(&[0x02, 0xff, 0xff]);
        let err = decode_binary(&mut p).unwrap_err();
        assert!(matches!(err.kind(), DecodeErrorKind::MalformedBlob(_)));
    }

    #[test]
    fn raw_json_is_text() {
        let v = Value::Json(serde_json::json!([1, "a"]));
        let mut out = StrictBuilder::new();
        encode_json(true, &v, &mut out).unwrap();
        let bytes = out.into_vec();
        assert_eq!(&bytes[1..], br#"[1,"a"]"#);
        assert_eq!(decode_json(true, &mut ByteParser::new(&bytes)).unwrap(), v);
    }

    #[test]
    fn typed_json_round_trips_value_tree() {
        let v = Value::Tuple(vec![Value::Int(7), Value::None]);
        let mut out = StrictBuilder::new();
        encode_json(false, &v, &mut out).unwrap();
        let bytes = out.into_vec();
        assert_eq!(decode_json(false, &mut ByteParser::new(&bytes)).unwrap(), v);
    }

    #[test]
    fn unknown_tag() {
        let reg = FormatRegistry::new();
        let err = decode_late_bound(&reg, &mut ByteParser::new(&[0x03, b'B', b'a', b'd']))
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &DecodeErrorKind::UnresolvedTypeTag("Bad".into())
        );
    }

    #[test]
    fn tag_resolution_failure_keeps_its_reason() {
        let err = tag_codec(Err(UsageError::CyclicType("Loop".into())), "Loop", 4).unwrap_err();
        assert_eq!(err.offset(), 4);
        match err.kind() {
            DecodeErrorKind::Rejected(msg) => assert!(msg.contains("self-referential"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        let err = tag_codec(Ok(None), "Ghost", 0).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::UnresolvedTypeTag("Ghost".into()));
    }

    proptest! {
        #[test]
        fn json_floats_round_trip(
            x in proptest::num::f64::NORMAL | proptest::num::f64::SUBNORMAL | proptest::num::f64::ZERO
        ) {
            let v = Value::Float(x);
            let mut out = StrictBuilder::new();
            encode_json(false, &v, &mut out).unwrap();
            let bytes = out.into_vec();
            prop_assert_eq!(decode_json(false, &mut ByteParser::new(&bytes)).unwrap(), v);
        }
    }
}
