//! Format registry
//!
//! The [`FormatRegistry`] resolves [`TypeDescriptor`]s into shared
//! [`Codec`]s and memoizes them by signature. It also holds the catalogue
//! of named types, and the custom codecs and post-decode hooks that records
//! refer to by key.
//!
//! # Resolution
//!
//! For each descriptor, in order:
//!
//! 1. An explicit format (field override or [`TypeDescriptor::Annotated`])
//!    is checked against the shape it is attached to, and used if
//!    compatible. An incompatible pairing fails resolution with
//!    [`UsageError::IncompatibleFormatOverride`].
//! 2. Otherwise the built-in default for the shape is used, with numbers
//!    written in the formats given by the registry's [`CodecConfig`].
//! 3. A named type with no catalogue entry uses the custom codec registered
//!    under its key, if any.
//! 4. Failing that, it takes the opaque binary blob, if the configuration
//!    allows it (with a warning), or fails with
//!    [`UsageError::NoCodecAvailable`].
//!
//! A named type that refers back to itself fails with
//! [`UsageError::CyclicType`].
//!
//! # Concurrency
//!
//! Codec construction is deterministic, so two threads racing to resolve
//! the same shape build equivalent codecs; the first to reach the cache
//! wins and both return it.
//!
//! Registering a type, custom codec or hook evicts every cached codec whose
//! construction looked up a named type, custom codec or hook, since the
//! registration may change what it resolves to. Shapes built only from
//! primitives and formats keep their cached codec for the life of the
//! registry. An evicted codec stays valid for whoever holds it and keeps
//! the behaviour it was built with; later calls resolve a fresh one. A
//! resolution that overlaps a registration returns a usable codec but does
//! not cache it.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::builder::strict::StrictBuilder;
use crate::codec::record::{FieldCodec, HookRef};
use crate::codec::{Codec, CustomRef, RecordCodec, SeqKind, TextEncoding};
use crate::config::CodecConfig;
use crate::error::{Result, UsageError, UsageResult};
use crate::format::{BlobFormat, Format};
use crate::parse::error::ParseResult;
use crate::parse::ByteParser;
use crate::schema::{Primitive, RecordDescriptor, TypeDescriptor};
use crate::stream::{Decoder, Encoder};
use crate::value::Value;
use crate::Builder;

/// Fully custom encoding for a type
///
/// The framework adds no framing around a custom payload: `decode` must
/// consume exactly the bytes `encode` produced.
pub trait CustomCodec: Send + Sync {
    fn encode(&self, value: &Value, out: &mut StrictBuilder) -> UsageResult<()>;

    fn decode(&self, p: &mut ByteParser<'_>) -> ParseResult<Value>;

    /// Whether `value` belongs to this type, for union variant selection
    fn accepts(&self, value: &Value) -> bool {
        let _ = value;
        true
    }
}

/// Construction hook run on the decoded fields of a record
///
/// When a record declares a hook, its included fields are delivered here by
/// name, in wire order, and whatever the hook returns is the decoded value.
/// Returning `Err` rejects the input.
pub trait PostDecode: Send + Sync {
    fn construct(
        &self,
        type_name: &str,
        fields: Vec<(String, Value)>,
    ) -> std::result::Result<Value, String>;
}

/// Process-wide cache from descriptor signature to codec
pub struct FormatRegistry {
    config: CodecConfig,
    catalog: RwLock<HashMap<String, TypeDescriptor>>,
    customs: RwLock<HashMap<String, Arc<dyn CustomCodec>>>,
    hooks: RwLock<HashMap<String, Arc<dyn PostDecode>>>,
    cache: RwLock<HashMap<String, CachedCodec>>,
    /// Bumped, under the cache write lock, by every registration
    generation: AtomicU64,
}

#[derive(Clone)]
struct CachedCodec {
    codec: Arc<Codec>,
    /// Whether building the codec consulted the catalogue, custom codecs or
    /// hooks, directly or through a part
    catalog_bound: bool,
}

/// State threaded through one top-level resolution
struct Resolving {
    /// Registry generation observed before the catalogue was first read
    generation: u64,
    /// Named types currently being resolved, outermost first
    stack: Vec<String>,
    /// Set once the shape being built depends on a registration
    catalog_bound: bool,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("config", &self.config)
            .field("types", &self.catalog.read().len())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

impl FormatRegistry {
    /// Creates an empty registry with the default configuration
    pub fn new() -> Self {
        Self::build(CodecConfig::default())
    }

    /// Creates an empty registry with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails if the numeric defaults are not numeric formats.
    pub fn with_config(config: CodecConfig) -> UsageResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CodecConfig) -> Self {
        Self {
            config,
            catalog: RwLock::new(HashMap::new()),
            customs: RwLock::new(HashMap::new()),
            hooks: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Drops every cached codec that depends on a registration and moves to
    /// a new generation, so that resolutions already in flight do not
    /// repopulate the cache with codecs built from the old catalogue
    fn invalidate(&self) {
        let mut cache = self.cache.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        cache.retain(|_, entry| !entry.catalog_bound);
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Adds a named type to the catalogue and resolves it immediately, so
    /// that incompatible overrides and cycles surface here.
    ///
    /// On failure the catalogue is left as it was.
    pub fn register_type(&self, key: impl Into<String>, descriptor: TypeDescriptor) -> UsageResult<()> {
        let key = key.into();
        let previous = self.catalog.write().insert(key.clone(), descriptor);
        self.invalidate();
        match self.resolve(&TypeDescriptor::Named(key.clone())) {
            Ok(_) => {
                debug!(type_key = %key, "registered type");
                Ok(())
            }
            Err(err) => {
                let mut catalog = self.catalog.write();
                match previous {
                    Some(desc) => catalog.insert(key, desc),
                    None => catalog.remove(&key),
                };
                drop(catalog);
                self.invalidate();
                Err(err)
            }
        }
    }

    /// Registers a fully custom codec under `key`.
    ///
    /// It is used by records that name it, and by `Named(key)` when no
    /// catalogue entry exists for `key`.
    pub fn register_custom(&self, key: impl Into<String>, codec: impl CustomCodec + 'static) {
        let key = key.into();
        debug!(type_key = %key, "registered custom codec");
        self.customs.write().insert(key, Arc::new(codec));
        self.invalidate();
    }

    /// Registers a post-decode hook under `key`, for records that name it
    pub fn register_hook(&self, key: impl Into<String>, hook: impl PostDecode + 'static) {
        let key = key.into();
        debug!(hook = %key, "registered post-decode hook");
        self.hooks.write().insert(key, Arc::new(hook));
        self.invalidate();
    }

    /// Returns the codec for `descriptor`, constructing and caching it if
    /// this is the first request for its shape.
    pub fn resolve(&self, descriptor: &TypeDescriptor) -> UsageResult<Arc<Codec>> {
        let mut cx = Resolving {
            generation: self.generation.load(Ordering::Acquire),
            stack: Vec::new(),
            catalog_bound: false,
        };
        self.resolve_in(descriptor, &mut cx)
    }

    /// Looks up the codec a late-bound tag dispatches to.
    ///
    /// Only catalogue entries and custom codecs are eligible; the opaque
    /// fallback never is.
    pub(crate) fn resolve_tag(&self, key: &str) -> UsageResult<Option<Arc<Codec>>> {
        let known =
            self.catalog.read().contains_key(key) || self.customs.read().contains_key(key);
        if known {
            self.resolve(&TypeDescriptor::Named(key.to_owned())).map(Some)
        } else {
            Ok(None)
        }
    }

    fn resolve_in(
        &self,
        descriptor: &TypeDescriptor,
        cx: &mut Resolving,
    ) -> UsageResult<Arc<Codec>> {
        let signature = descriptor.to_string();
        let cached = self.cache.read().get(&signature).cloned();
        if let Some(entry) = cached {
            trace!(%signature, "codec cache hit");
            cx.catalog_bound |= entry.catalog_bound;
            return Ok(entry.codec);
        }
        let outer = std::mem::replace(&mut cx.catalog_bound, false);
        let built = self.construct(descriptor, cx);
        let catalog_bound = cx.catalog_bound;
        cx.catalog_bound |= outer;
        let codec = Arc::new(built?);
        debug!(%signature, catalog_bound, "constructed codec");
        let mut cache = self.cache.write();
        if self.generation.load(Ordering::Acquire) != cx.generation {
            // built against a catalogue that has since changed
            return Ok(codec);
        }
        let entry = cache.entry(signature).or_insert(CachedCodec {
            codec,
            catalog_bound,
        });
        Ok(Arc::clone(&entry.codec))
    }

    fn construct(&self, descriptor: &TypeDescriptor, cx: &mut Resolving) -> UsageResult<Codec> {
        use TypeDescriptor as T;

        Ok(match descriptor {
            T::Primitive(p) => self.primitive(*p),
            T::Format(f) => standalone(*f),
            T::Optional(inner) => Codec::Optional(self.resolve_in(inner, cx)?),
            T::Union(variants) => {
                if variants.is_empty() {
                    return Err(UsageError::InvalidDescriptor("union with no variants".into()));
                }
                Codec::Union(
                    variants
                        .iter()
                        .map(|v| self.resolve_in(v, cx))
                        .collect::<UsageResult<_>>()?,
                )
            }
            T::List(elem) => self.seq(SeqKind::List, elem, cx)?,
            T::Set(elem) => self.seq(SeqKind::Set, elem, cx)?,
            T::FrozenSet(elem) => self.seq(SeqKind::FrozenSet, elem, cx)?,
            T::TupleVariadic(elem) => self.seq(SeqKind::Tuple, elem, cx)?,
            T::Deque(elem) => Codec::Deque {
                bound: self.resolve_in(&TypeDescriptor::optional(TypeDescriptor::INT), cx)?,
                elem: self.resolve_in(elem, cx)?,
            },
            T::Dict(key, value) => Codec::Dict {
                key: self.resolve_in(key, cx)?,
                value: self.resolve_in(value, cx)?,
            },
            T::TupleFixed(elems) if elems.is_empty() => Codec::Constant(Value::Tuple(Vec::new())),
            T::TupleFixed(elems) => Codec::Tuple(
                elems
                    .iter()
                    .map(|e| self.resolve_in(e, cx))
                    .collect::<UsageResult<_>>()?,
            ),
            T::Literal(consts) => match consts.as_slice() {
                [] => return Err(UsageError::InvalidDescriptor("literal with no values".into())),
                [only] => Codec::Constant(only.clone()),
                _ => Codec::Literal(consts.clone()),
            },
            T::Record(rec) => self.record(rec, cx)?,
            T::Alias(_, inner) => {
                let aliased = self.resolve_in(inner, cx)?;
                Codec::clone(&aliased)
            }
            T::Annotated(inner, format) => self.annotated(inner, *format, cx)?,
            T::Named(key) => self.named(key, cx)?,
            T::LateBound => Codec::LateBound,
            T::Opaque(BlobFormat::Json) => Codec::Json { raw: true },
            T::Opaque(BlobFormat::Binary) => Codec::Blob,
        })
    }

    fn primitive(&self, p: Primitive) -> Codec {
        let numeric = self.config.numeric;
        match p {
            Primitive::Bool => Codec::Bool,
            Primitive::Int => standalone(numeric.int),
            Primitive::Float => Codec::Float(numeric.float),
            Primitive::Complex => Codec::Complex(numeric.float),
            Primitive::Bytes => Codec::Bytes,
            Primitive::Text => text(TextEncoding::Utf8, false),
            Primitive::Path => text(TextEncoding::Utf8, true),
            Primitive::None => Codec::Constant(Value::None),
            Primitive::Ellipsis => Codec::Constant(Value::Ellipsis),
        }
    }

    fn seq(&self, kind: SeqKind, elem: &TypeDescriptor, cx: &mut Resolving) -> UsageResult<Codec> {
        Ok(Codec::Seq {
            kind,
            elem: self.resolve_in(elem, cx)?,
        })
    }

    fn annotated(
        &self,
        inner: &TypeDescriptor,
        format: Format,
        cx: &mut Resolving,
    ) -> UsageResult<Codec> {
        use TypeDescriptor as T;

        let mut shape = inner;
        while let T::Alias(_, aliased) = shape {
            shape = aliased;
        }
        let encoding = match format {
            Format::Utf8 => Some(TextEncoding::Utf8),
            Format::Utf16 => Some(TextEncoding::Utf16),
            Format::NtBytes => Some(TextEncoding::Terminated),
            _ => None,
        };
        let codec = match (shape, format) {
            (_, Format::Blob) => Some(Codec::Blob),
            (T::Opaque(BlobFormat::Json), Format::Json) => Some(Codec::Json { raw: true }),
            (_, Format::Json) => Some(Codec::Json { raw: false }),
            (T::Primitive(Primitive::Int), f) if f.is_integer() => Some(standalone(f)),
            (T::Primitive(Primitive::Float), f) if f.is_float() => Some(Codec::Float(f)),
            (T::Primitive(Primitive::Complex), f) if f.is_float() => Some(Codec::Complex(f)),
            (T::Primitive(Primitive::Bool), Format::Bool) => Some(Codec::Bool),
            (T::Primitive(Primitive::Bytes), Format::Bytes) => Some(Codec::Bytes),
            (T::Primitive(Primitive::Bytes), Format::NtBytes) => Some(Codec::NtBytes),
            (T::Primitive(Primitive::Text), _) => encoding.map(|e| text(e, false)),
            (T::Primitive(Primitive::Path), _) => encoding.map(|e| text(e, true)),
            (T::Primitive(p @ (Primitive::None | Primitive::Ellipsis)), Format::Void) => {
                Some(self.primitive(*p))
            }
            (T::Format(own), f) if *own == f => Some(standalone(f)),
            (T::Named(_) | T::Record(_) | T::LateBound, Format::Type) => Some(Codec::LateBound),
            (T::Optional(opt), f) => {
                let annotated = TypeDescriptor::Annotated(opt.clone(), f);
                Some(Codec::Optional(self.resolve_in(&annotated, cx)?))
            }
            _ => None,
        };
        codec.ok_or_else(|| UsageError::IncompatibleFormatOverride {
            format,
            shape: inner.to_string(),
        })
    }

    fn named(&self, key: &str, cx: &mut Resolving) -> UsageResult<Codec> {
        cx.catalog_bound = true;
        if cx.stack.iter().any(|k| k == key) {
            return Err(UsageError::CyclicType(key.to_owned()));
        }
        let entry = self.catalog.read().get(key).cloned();
        if let Some(descriptor) = entry {
            cx.stack.push(key.to_owned());
            let resolved = self.resolve_in(&descriptor, cx);
            cx.stack.pop();
            return resolved.map(|codec| Codec::clone(&codec));
        }
        let custom = self.customs.read().get(key).cloned();
        if let Some(codec) = custom {
            return Ok(Codec::Custom {
                key: key.to_owned(),
                codec: CustomRef(codec),
            });
        }
        if self.config.allow_opaque_fallback {
            warn!(type_key = %key, "no codec registered, falling back to opaque blob");
            return Ok(Codec::Blob);
        }
        Err(UsageError::NoCodecAvailable(key.to_owned()))
    }

    fn record(&self, rec: &RecordDescriptor, cx: &mut Resolving) -> UsageResult<Codec> {
        if rec.custom.is_some() || rec.hook.is_some() {
            cx.catalog_bound = true;
        }
        if let Some(key) = &rec.custom {
            let codec = self
                .customs
                .read()
                .get(key)
                .cloned()
                .ok_or_else(|| UsageError::NoCodecAvailable(format!("custom codec `{key}`")))?;
            return Ok(Codec::Custom {
                key: key.clone(),
                codec: CustomRef(codec),
            });
        }
        let hook = match &rec.hook {
            Some(key) => Some(HookRef(
                self.hooks
                    .read()
                    .get(key)
                    .cloned()
                    .ok_or_else(|| UsageError::NoCodecAvailable(format!("post-decode hook `{key}`")))?,
            )),
            None => None,
        };
        let fields = rec
            .fields
            .iter()
            .map(|spec| -> UsageResult<FieldCodec> {
                let codec = if spec.included {
                    Some(self.resolve_in(&spec.effective_descriptor(), cx)?)
                } else {
                    None
                };
                Ok(FieldCodec {
                    name: spec.name.clone(),
                    codec,
                    default: spec.default.clone(),
                })
            })
            .collect::<UsageResult<Vec<_>>>()?;
        Ok(Codec::Record(RecordCodec::new(rec.name.clone(), fields, hook)))
    }

    /// Encodes `value` as the shape `descriptor` describes.
    pub fn encode(&self, value: &Value, descriptor: &TypeDescriptor) -> Result<Vec<u8>> {
        let codec = self.resolve(descriptor)?;
        let mut out = StrictBuilder::new();
        codec.encode(self, value, &mut out)?;
        Ok(out.into_vec())
    }

    /// Decodes one value of the shape `descriptor` describes from `bytes`.
    ///
    /// With the feature `check_complete_parse`, bytes left over after the
    /// value fail with `TrailingBytes`.
    pub fn decode(&self, bytes: &[u8], descriptor: &TypeDescriptor) -> Result<Value> {
        let codec = self.resolve(descriptor)?;
        let mut p = ByteParser::new(bytes);
        let value = codec.decode(self, &mut p)?;
        cfg_if::cfg_if! {
            if #[cfg(feature = "check_complete_parse")] {
                p.finish()?;
            } else {
                let _ = p;
            }
        }
        Ok(value)
    }

    /// Returns an [`Encoder`] appending successive values to `sink`
    pub fn encoder<W: Write>(&self, sink: W) -> Encoder<'_, W> {
        Encoder::new(self, sink)
    }

    /// Returns a [`Decoder`] reading successive values from `bytes`
    pub fn decoder<'a>(&self, bytes: &'a [u8]) -> Decoder<'_, 'a> {
        Decoder::new(self, bytes)
    }
}

fn standalone(format: Format) -> Codec {
    match format {
        Format::Bool => Codec::Bool,
        Format::U8
        | Format::U16
        | Format::U32
        | Format::U64
        | Format::I8
        | Format::I16
        | Format::I32
        | Format::I64 => Codec::Fixed(format),
        Format::F32 | Format::F64 => Codec::Float(format),
        Format::V8
        | Format::V16
        | Format::V32
        | Format::V64
        | Format::W8
        | Format::W16
        | Format::W32
        | Format::W64 => Codec::Vlq(format),
        Format::Vn => Codec::BigVlq { signed: false },
        Format::Wn => Codec::BigVlq { signed: true },
        Format::Bytes => Codec::Bytes,
        Format::NtBytes => Codec::NtBytes,
        Format::Utf8 => text(TextEncoding::Utf8, false),
        Format::Utf16 => text(TextEncoding::Utf16, false),
        Format::Json => Codec::Json { raw: true },
        Format::Type => Codec::LateBound,
        Format::Blob => Codec::Blob,
        Format::Void => Codec::Constant(Value::None),
    }
}

fn text(encoding: TextEncoding, path: bool) -> Codec {
    Codec::Text { encoding, path }
}

lazy_static::lazy_static! {
    static ref GLOBAL: FormatRegistry = FormatRegistry::new();
}

/// Process-wide registry used by the crate-level [`encode`](crate::encode)
/// and [`decode`](crate::decode)
pub fn global() -> &'static FormatRegistry {
    &GLOBAL
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::error::DecodeErrorKind;
    use crate::parse::Parser;
    use crate::schema::FieldSpec;
    use crate::value::Record;
    use tracing_test::traced_test;

    fn person() -> TypeDescriptor {
        RecordDescriptor::new("Person")
            .field(FieldSpec::new("age", TypeDescriptor::optional(TypeDescriptor::INT)))
            .field(FieldSpec::new("name", Primitive::Text))
            .into()
    }

    #[test]
    fn registry_threadsafe() {
        fn dummy<T: Send + Sync>() {}
        dummy::<FormatRegistry>();
        dummy::<Arc<Codec>>();
    }

    #[test]
    fn codecs_are_memoized() {
        let reg = FormatRegistry::new();
        let a = reg.resolve(&TypeDescriptor::list(TypeDescriptor::INT)).unwrap();
        let b = reg.resolve(&TypeDescriptor::list(TypeDescriptor::INT)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let aliased = reg
            .resolve(&TypeDescriptor::list(TypeDescriptor::alias("Age", TypeDescriptor::INT)))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &aliased));
    }

    #[test]
    fn incompatible_override() {
        let reg = FormatRegistry::new();
        let err = reg
            .resolve(&TypeDescriptor::TEXT.with_format(Format::F32))
            .unwrap_err();
        assert!(matches!(
            err,
            UsageError::IncompatibleFormatOverride { format: Format::F32, .. }
        ));
        let rec = RecordDescriptor::new("Bad")
            .field(FieldSpec::new("flag", Primitive::Bool).with_format(Format::U64));
        assert!(reg.register_type("Bad", rec.into()).is_err());
        assert!(matches!(
            reg.resolve(&TypeDescriptor::named("Bad")),
            Err(UsageError::NoCodecAvailable(_))
        ));
    }

    #[test]
    fn override_reaches_through_optional() {
        let reg = FormatRegistry::new();
        let desc = TypeDescriptor::optional(TypeDescriptor::INT).with_format(Format::U16);
        assert_eq!(reg.encode(&Value::Int(258), &desc).unwrap(), vec![0x01, 0x02, 0x01]);
    }

    #[test]
    fn cyclic_types_rejected() {
        let reg = FormatRegistry::new();
        let node = RecordDescriptor::new("Node")
            .field(FieldSpec::new("value", Primitive::Int))
            .field(FieldSpec::new(
                "next",
                TypeDescriptor::optional(TypeDescriptor::named("Node")),
            ));
        assert_eq!(
            reg.register_type("Node", node.into()),
            Err(UsageError::CyclicType("Node".into()))
        );
    }

    #[test]
    fn unknown_named_type_without_fallback() {
        let reg = FormatRegistry::new();
        assert_eq!(
            reg.resolve(&TypeDescriptor::named("Widget")).unwrap_err(),
            UsageError::NoCodecAvailable("Widget".into())
        );
    }

    #[test]
    #[traced_test]
    fn fallback_warns_and_round_trips() {
        let reg = FormatRegistry::with_config(CodecConfig::default().with_opaque_fallback(true))
            .unwrap();
        let desc = TypeDescriptor::named("Widget");
        let v = Value::Record(Record::new("Widget").with("size", 3u8));
        let bytes = reg.encode(&v, &desc).unwrap();
        assert_eq!(reg.decode(&bytes, &desc).unwrap(), v);
        assert!(logs_contain("falling back to opaque blob"));
    }

    #[test]
    fn explicit_opaque_is_not_a_fallback() {
        let reg = FormatRegistry::new();
        let desc = TypeDescriptor::Opaque(BlobFormat::Binary);
        let v = Value::Set(vec![Value::Int(1)]);
        assert_eq!(reg.decode(&reg.encode(&v, &desc).unwrap(), &desc).unwrap(), v);
    }

    struct Point;

    impl CustomCodec for Point {
        fn encode(&self, value: &Value, out: &mut StrictBuilder) -> UsageResult<()> {
            use crate::conv::Encode;
            match value {
                Value::Tuple(xs) => match xs.as_slice() {
                    [Value::Int(x), Value::Int(y)] => {
                        (*x as i16).write_to(out);
                        (*y as i16).write_to(out);
                        Ok(())
                    }
                    _ => Err(UsageError::mismatch("point", value)),
                },
                other => Err(UsageError::mismatch("point", other)),
            }
        }

        fn decode(&self, p: &mut ByteParser<'_>) -> ParseResult<Value> {
            let x = p.take_i16()?;
            let y = p.take_i16()?;
            Ok(Value::Tuple(vec![Value::from(x), Value::from(y)]))
        }
    }

    #[test]
    fn custom_codec_has_no_framing() {
        let reg = FormatRegistry::new();
        reg.register_custom("Point", Point);
        let desc = TypeDescriptor::named("Point");
        let v = Value::Tuple(vec![Value::Int(1), Value::Int(-1)]);
        let bytes = reg.encode(&v, &desc).unwrap();
        assert_eq!(bytes, vec![0x01, 0x00, 0xff, 0xff]);
        assert_eq!(reg.decode(&bytes, &desc).unwrap(), v);
    }

    #[test]
    fn late_bound_dispatch() {
        let reg = FormatRegistry::new();
        reg.register_type("Person", person()).unwrap();
        let v = Value::Tagged {
            key: "Person".into(),
            value: Box::new(Value::Record(
                Record::new("Person").with("age", Value::None).with("name", "Ann"),
            )),
        };
        let bytes = reg.encode(&v, &TypeDescriptor::LateBound).unwrap();
        assert_eq!(&bytes[..7], b"\x06Person");
        assert_eq!(reg.decode(&bytes, &TypeDescriptor::LateBound).unwrap(), v);
    }

    #[test]
    fn unresolved_tag_is_malformed_input() {
        let reg = FormatRegistry::new();
        let err = reg
            .decode(b"\x05Ghost\x00", &TypeDescriptor::LateBound)
            .unwrap_err();
        assert_eq!(
            err.as_decode().map(|e| e.kind()),
            Some(&DecodeErrorKind::UnresolvedTypeTag("Ghost".into()))
        );
    }

    #[test]
    fn compact_defaults_via_config() {
        let reg = FormatRegistry::with_config(
            CodecConfig::default().with_numeric(Format::V64, Format::F32),
        )
        .unwrap();
        assert_eq!(reg.encode(&Value::Int(300), &TypeDescriptor::INT).unwrap(), vec![0xac, 0x02]);
        assert_eq!(reg.encode(&Value::Float(1.0), &TypeDescriptor::FLOAT).unwrap().len(), 4);
        assert!(FormatRegistry::with_config(
            CodecConfig::default().with_numeric(Format::Utf8, Format::F32)
        )
        .is_err());
    }

    #[test]
    fn concurrent_resolution_agrees() {
        let reg = Arc::new(FormatRegistry::new());
        let desc = TypeDescriptor::dict(TypeDescriptor::TEXT, TypeDescriptor::list(TypeDescriptor::FLOAT));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let desc = desc.clone();
                std::thread::spawn(move || reg.resolve(&desc).unwrap())
            })
            .collect();
        let codecs: Vec<Arc<Codec>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let cached = reg.resolve(&desc).unwrap();
        assert!(codecs.iter().all(|c| Arc::ptr_eq(c, &cached)));
    }

    #[test]
    fn constants_consume_nothing() {
        let reg = FormatRegistry::new();
        let codec = reg.resolve(&TypeDescriptor::NONE).unwrap();
        let mut p = ByteParser::new(&[]);
        assert_eq!(codec.decode(&reg, &mut p).unwrap(), Value::None);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn alias_takes_format_override() {
        let reg = FormatRegistry::new();
        let age = TypeDescriptor::alias("Age", TypeDescriptor::INT).with_format(Format::U16);
        let bytes = reg.encode(&Value::Int(1), &age).unwrap();
        assert_eq!(bytes, vec![0x01, 0x00]);
        assert_eq!(reg.decode(&bytes, &age).unwrap(), Value::Int(1));
        let plain = TypeDescriptor::alias("Age", TypeDescriptor::INT);
        assert_eq!(
            reg.encode(&Value::Int(1), &plain).unwrap(),
            reg.encode(&Value::Int(1), &TypeDescriptor::INT).unwrap()
        );
    }

    #[test]
    fn failed_reregistration_keeps_previous() {
        let reg = FormatRegistry::new();
        let good = RecordDescriptor::new("Bad").field(FieldSpec::new("flag", Primitive::Bool));
        reg.register_type("Bad", good.into()).unwrap();
        let desc = TypeDescriptor::named("Bad");
        let v = Value::Record(Record::new("Bad").with("flag", true));
        assert_eq!(reg.encode(&v, &desc).unwrap(), vec![0x01]);

        let bad = RecordDescriptor::new("Bad")
            .field(FieldSpec::new("flag", Primitive::Bool).with_format(Format::U64));
        assert!(matches!(
            reg.register_type("Bad", bad.into()),
            Err(UsageError::IncompatibleFormatOverride { format: Format::U64, .. })
        ));
        assert_eq!(reg.encode(&v, &desc).unwrap(), vec![0x01]);
        assert_eq!(reg.decode(&[0x01], &desc).unwrap(), v);
    }

    #[test]
    fn reregistration_replaces_cached_codec() {
        let reg = FormatRegistry::new();
        let narrow = RecordDescriptor::new("P")
            .field(FieldSpec::new("x", Primitive::Int).with_format(Format::U8));
        reg.register_type("P", narrow.into()).unwrap();
        let desc = TypeDescriptor::named("P");
        let before = reg.resolve(&desc).unwrap();

        let wide = RecordDescriptor::new("P")
            .field(FieldSpec::new("x", Primitive::Int).with_format(Format::U16));
        reg.register_type("P", wide.into()).unwrap();
        let after = reg.resolve(&desc).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        let wrapped = reg.resolve(&TypeDescriptor::list(desc.clone())).unwrap();
        assert!(matches!(wrapped.as_ref(), Codec::Seq { elem, .. } if Arc::ptr_eq(elem, &after)));

        let v = Value::Record(Record::new("P").with("x", 5u8));
        let mut old = StrictBuilder::new();
        before.encode(&reg, &v, &mut old).unwrap();
        assert_eq!(old.into_vec(), vec![0x05]);
        assert_eq!(reg.encode(&v, &desc).unwrap(), vec![0x05, 0x00]);
    }

    #[test]
    fn unrelated_codecs_survive_registration() {
        let reg = FormatRegistry::new();
        let ints = TypeDescriptor::dict(TypeDescriptor::TEXT, TypeDescriptor::list(TypeDescriptor::INT));
        let before = reg.resolve(&ints).unwrap();
        reg.register_type("Person", person()).unwrap();
        reg.register_custom("Point", Point);
        assert!(Arc::ptr_eq(&before, &reg.resolve(&ints).unwrap()));

        let people = TypeDescriptor::list(TypeDescriptor::named("Person"));
        let first = reg.resolve(&people).unwrap();
        reg.register_type("Person", person()).unwrap();
        assert!(!Arc::ptr_eq(&first, &reg.resolve(&people).unwrap()));
    }

    #[test]
    fn stale_resolution_is_not_cached() {
        let reg = FormatRegistry::new();
        let desc = TypeDescriptor::list(TypeDescriptor::BOOL);
        let mut cx = Resolving {
            generation: reg.generation.load(Ordering::Acquire),
            stack: Vec::new(),
            catalog_bound: false,
        };
        reg.invalidate();
        assert!(reg.resolve_in(&desc, &mut cx).is_ok());
        assert!(!reg.cache.read().contains_key(&desc.to_string()));
        let fresh = reg.resolve(&desc).unwrap();
        assert!(Arc::ptr_eq(&fresh, &reg.resolve(&desc).unwrap()));
    }
}
