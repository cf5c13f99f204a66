//! Descriptor-driven compact binary codec
//!
//! # Overview
//!
//! `binform` turns a [`Value`] into a compact byte sequence, and back, under
//! the direction of a [`TypeDescriptor`] that the caller always supplies. The
//! wire format carries no type information of its own, apart from two opt-in
//! shapes: late-bound tags, which embed a registered type key so the concrete
//! type can be chosen at decode time, and self-contained blobs.
//!
//! Descriptors are resolved into shared [`Codec`](codec::Codec)s by a
//! [`FormatRegistry`], which memoizes codecs by the descriptor's canonical
//! signature and holds the catalogue of named record types, custom codecs
//! and post-decode hooks. A process-wide registry backs the free functions
//! [`encode`] and [`decode`].
//!
//! Underneath sit the [`Encode`]/[`Decode`] traits over a
//! [`Target`](conv::target::Target) sink and a [`Parser`] cursor. Scalars
//! and unbounded VLQ integers implement them directly, and the codecs
//! are written on top.
//!
//! # Wire primitives
//!
//! | tag | shape |
//! |-----|-------|
//! | `bool` | one byte, `0x01` or `0x00` |
//! | `u8`..`u64`, `i8`..`i64` | little-endian |
//! | `f32`, `f64` | IEEE-754, little-endian |
//! | `v8`..`v64`, `vn` | unsigned VLQ, least significant group first |
//! | `w8`..`w64`, `wn` | zig-zag signed VLQ |
//! | `bytes`, `utf-8`, `utf-16` | VLQ length then payload |
//! | `nt-bytes` | payload then `0x00` |
//! | `json`, `blob` | length-prefixed self-contained blob |
//! | `type` | length-prefixed type key then that type's payload |
//! | `void` | nothing |
//!
//! # Errors
//!
//! Decoding fails only with a [`DecodeError`], which carries the offset and
//! the nested shape path where the input was found malformed. Encoding and
//! registration fail only with a [`UsageError`], which indicates a defect in
//! the caller's values or descriptors. Neither ever yields a partial value.
//!
//! # Example
//!
//! ```
//! use binform::{FieldSpec, FormatRegistry, Record, RecordDescriptor, TypeDescriptor, Value};
//!
//! let reg = FormatRegistry::new();
//! let person = RecordDescriptor::new("Person")
//!     .field(FieldSpec::new("age", TypeDescriptor::optional(TypeDescriptor::INT)))
//!     .field(FieldSpec::new("name", TypeDescriptor::TEXT));
//! reg.register_type("Person", person.into()).unwrap();
//!
//! let desc = TypeDescriptor::named("Person");
//! let v = Value::Record(Record::new("Person").with("age", 34u8).with("name", "John Doe"));
//! let bytes = reg.encode(&v, &desc).unwrap();
//! assert_eq!(reg.decode(&bytes, &desc).unwrap(), v);
//! ```

pub mod builder;
pub mod codec;
pub mod config;
pub mod conv;
pub mod error;
pub mod format;
pub mod parse;
pub mod prelude;
pub mod prim;
pub mod registry;
pub mod schema;
pub mod stream;
pub mod value;
pub mod vlq;

pub use builder::{strict::StrictBuilder, Builder};
pub use config::{CodecConfig, NumericDefaults};
pub use conv::{target::Target, Decode, Encode};
pub use error::{Error, Result, UsageError};
pub use format::{BlobFormat, Format};
pub use parse::error::{DecodeError, DecodeErrorKind, PathSegment};
pub use parse::{ByteParser, Parser};
pub use registry::{global, CustomCodec, FormatRegistry, PostDecode};
pub use schema::{FieldSpec, Primitive, RecordDescriptor, TypeDescriptor};
pub use stream::{Decoder, Encoder};
pub use value::{Record, Value};
pub use vlq::{N, Z};

/// Encodes `value` with the process-wide registry
pub fn encode(value: &Value, descriptor: &TypeDescriptor) -> Result<Vec<u8>> {
    global().encode(value, descriptor)
}

/// Decodes one value with the process-wide registry
pub fn decode(bytes: &[u8], descriptor: &TypeDescriptor) -> Result<Value> {
    global().decode(bytes, descriptor)
}
