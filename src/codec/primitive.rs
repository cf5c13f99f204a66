//! Leaf codecs
//!
//! Fixed-width numbers go through the [`Encode`]/[`Decode`] impls in
//! [`prim`](crate::prim); variable-width integers through
//! [`Target::push_vlq`] and [`Parser::take_vlq`], or the arbitrary-precision
//! [`N`]/[`Z`] types for the unbounded formats.
//!
//! Floats narrowed to `f32` lose precision on the way out; everything else
//! round-trips exactly.

use std::path::PathBuf;

use num_bigint::BigInt;

use super::TextEncoding;
use crate::builder::strict::StrictBuilder;
use crate::conv::target::Target;
use crate::conv::{Decode, Encode};
use crate::error::{UsageError, UsageResult};
use crate::format::Format;
use crate::parse::error::{DecodeError, DecodeErrorKind, ParseResult};
use crate::parse::{ByteParser, Parser};
use crate::value::Value;
use crate::vlq::{n::N, unzigzag, z::Z, zigzag};

const UTF16_LE_BOM: [u8; 2] = [0xff, 0xfe];

pub(crate) fn encode_constant(constant: &Value, value: &Value) -> UsageResult<()> {
    if constant == value {
        Ok(())
    } else {
        Err(UsageError::mismatch(format_args!("{constant:?}"), value))
    }
}

pub(crate) fn encode_bool(value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
    match value {
        Value::Bool(b) => {
            b.write_to(out);
            Ok(())
        }
        other => Err(UsageError::mismatch(Format::Bool, other)),
    }
}

pub(crate) fn decode_bool(p: &mut ByteParser<'_>) -> ParseResult<Value> {
    bool::parse(p).map(Value::Bool)
}

pub(crate) fn encode_int(format: Format, value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
    let n = match value {
        Value::Int(n) => *n,
        other => return Err(UsageError::mismatch(format, other)),
    };
    match format.int_range() {
        Some((lo, hi)) if (lo..=hi).contains(&n) => {}
        _ => {
            return Err(UsageError::OutOfRange {
                value: n.to_string(),
                format,
            })
        }
    }
    // range was checked above, so the casts below are lossless
    match format {
        Format::U8 => (n as u8).write_to(out),
        Format::U16 => (n as u16).write_to(out),
        Format::U32 => (n as u32).write_to(out),
        Format::U64 => (n as u64).write_to(out),
        Format::I8 => (n as i8).write_to(out),
        Format::I16 => (n as i16).write_to(out),
        Format::I32 => (n as i32).write_to(out),
        Format::I64 => (n as i64).write_to(out),
        f if f.is_zigzag() => out.push_vlq(zigzag(n as i64)),
        _ => out.push_vlq(n as u64),
    };
    Ok(())
}

pub(crate) fn decode_int(format: Format, p: &mut ByteParser<'_>) -> ParseResult<Value> {
    let n: i128 = match format {
        Format::U8 => u8::parse(p)?.into(),
        Format::U16 => u16::parse(p)?.into(),
        Format::U32 => u32::parse(p)?.into(),
        Format::U64 => u64::parse(p)?.into(),
        Format::I8 => i8::parse(p)?.into(),
        Format::I16 => i16::parse(p)?.into(),
        Format::I32 => i32::parse(p)?.into(),
        Format::I64 => i64::parse(p)?.into(),
        f => {
            let bits = f.vlq_bits().unwrap_or(64);
            let raw = p.take_vlq(bits)?;
            if f.is_zigzag() {
                unzigzag(raw).into()
            } else {
                raw.into()
            }
        }
    };
    Ok(Value::Int(n))
}

pub(crate) fn encode_big(signed: bool, value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
    let format = if signed { Format::Wn } else { Format::Vn };
    let n = match value {
        Value::Int(n) => BigInt::from(*n),
        Value::BigInt(n) => n.clone(),
        other => return Err(UsageError::mismatch(format, other)),
    };
    if signed {
        Z(n).write_to(out);
    } else {
        let nat = n.to_biguint().ok_or_else(|| UsageError::OutOfRange {
            value: n.to_string(),
            format,
        })?;
        N(nat).write_to(out);
    }
    Ok(())
}

pub(crate) fn decode_big(signed: bool, p: &mut ByteParser<'_>) -> ParseResult<Value> {
    let n = if signed {
        Z::parse(p)?.into_inner()
    } else {
        BigInt::from(N::parse(p)?.into_inner())
    };
    Ok(Value::BigInt(n))
}

fn write_float(format: Format, x: f64, out: &mut StrictBuilder) {
    if format == Format::F32 {
        (x as f32).write_to(out);
    } else {
        x.write_to(out);
    }
}

fn read_float(format: Format, p: &mut ByteParser<'_>) -> ParseResult<f64> {
    if format == Format::F32 {
        f32::parse(p).map(f64::from)
    } else {
        f64::parse(p)
    }
}

pub(crate) fn encode_float(format: Format, value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
    match value {
        Value::Float(x) => {
            write_float(format, *x, out);
            Ok(())
        }
        other => Err(UsageError::mismatch(format, other)),
    }
}

pub(crate) fn decode_float(format: Format, p: &mut ByteParser<'_>) -> ParseResult<Value> {
    read_float(format, p).map(Value::Float)
}

pub(crate) fn encode_complex(format: Format, value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
    match value {
        Value::Complex { re, im } => {
            write_float(format, *re, out);
            write_float(format, *im, out);
            Ok(())
        }
        other => Err(UsageError::mismatch("complex", other)),
    }
}

pub(crate) fn decode_complex(format: Format, p: &mut ByteParser<'_>) -> ParseResult<Value> {
    let re = read_float(format, p)?;
    let im = read_float(format, p)?;
    Ok(Value::Complex { re, im })
}

pub(crate) fn encode_bytes(terminated: bool, value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
    let bytes = match value {
        Value::Bytes(b) => b,
        other => {
            let format = if terminated { Format::NtBytes } else { Format::Bytes };
            return Err(UsageError::mismatch(format, other));
        }
    };
    if terminated {
        out.push_terminated(bytes)?;
    } else {
        out.push_prefixed(bytes);
    }
    Ok(())
}

pub(crate) fn decode_bytes(terminated: bool, p: &mut ByteParser<'_>) -> ParseResult<Value> {
    let bytes = if terminated {
        p.take_terminated()?
    } else {
        p.take_prefixed()?.to_vec()
    };
    Ok(Value::Bytes(bytes))
}

pub(crate) fn encode_text(
    encoding: TextEncoding,
    path: bool,
    value: &Value,
    out: &mut StrictBuilder,
) -> UsageResult<()> {
    let text = match (path, value) {
        (false, Value::Text(s)) => s.as_str(),
        (true, Value::Path(pb)) => pb
            .to_str()
            .ok_or_else(|| UsageError::mismatch("UTF-8 path", value))?,
        (false, other) => return Err(UsageError::mismatch("str", other)),
        (true, other) => return Err(UsageError::mismatch("path", other)),
    };
    match encoding {
        TextEncoding::Utf8 => {
            out.push_prefixed(text.as_bytes());
        }
        TextEncoding::Terminated => {
            out.push_terminated(text.as_bytes())?;
        }
        TextEncoding::Utf16 => {
            let mut buf = Vec::with_capacity(2 + 2 * text.len());
            buf.extend_from_slice(&UTF16_LE_BOM);
            for unit in text.encode_utf16() {
                buf.extend_from_slice(&unit.to_le_bytes());
            }
            out.push_prefixed(&buf);
        }
    }
    Ok(())
}

fn utf16_to_string(bytes: &[u8]) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err(format!("odd UTF-16 byte count {}", bytes.len()));
    }
    let (big_endian, body) = match bytes {
        [0xff, 0xfe, rest @ ..] => (false, rest),
        [0xfe, 0xff, rest @ ..] => (true, rest),
        _ => (false, bytes),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| {
            if big_endian {
                u16::from_be_bytes([c[0], c[1]])
            } else {
                u16::from_le_bytes([c[0], c[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|e| e.to_string())
}

pub(crate) fn decode_text(
    encoding: TextEncoding,
    path: bool,
    p: &mut ByteParser<'_>,
) -> ParseResult<Value> {
    let start = p.offset();
    let text = match encoding {
        TextEncoding::Utf8 => {
            std::str::from_utf8(p.take_prefixed()?).map(str::to_owned).map_err(|e| e.to_string())
        }
        TextEncoding::Terminated => String::from_utf8(p.take_terminated()?).map_err(|e| e.to_string()),
        TextEncoding::Utf16 => utf16_to_string(p.take_prefixed()?),
    }
    .map_err(|msg| DecodeError::new(DecodeErrorKind::InvalidText(msg), start))?;
    Ok(if path {
        Value::Path(PathBuf::from(text))
    } else {
        Value::Text(text)
    })
}
