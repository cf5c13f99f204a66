//! Type descriptors
//!
//! A [`TypeDescriptor`] is the immutable, recursively-defined description of
//! a value's shape from which a [`Codec`](crate::codec::Codec) is resolved.
//! Descriptors are compared structurally: two descriptors with the same
//! shape are interchangeable, and resolve to the same cached codec.
//!
//! # Signatures
//!
//! Every descriptor renders (via [`Display`]) to a canonical signature such
//! as `dict[str, list[int]]`, which the registry uses as its cache key.
//! Signatures are injective over shapes: aliases render as the shape they
//! rename, explicit formats render as `<tag>`, and references into the
//! registry catalogue render as `@key`.
//!
//! # Records
//!
//! A [`RecordDescriptor`] lists its [`FieldSpec`]s in wire order. The order
//! is fixed once the descriptor is built; fields are appended with
//! [`RecordDescriptor::field`] and never reordered.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::format::{BlobFormat, Format};
use crate::value::Value;

/// Primitive shape with a built-in default codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    /// Integer of unspecified width, written in the configured default format
    Int,
    /// Float of unspecified width, written in the configured default format
    Float,
    /// Pair of floats in the default float format
    Complex,
    Bytes,
    Text,
    /// Filesystem path, written as UTF-8 text
    Path,
    /// The "no value" marker (zero bytes)
    None,
    /// The ellipsis marker (zero bytes)
    Ellipsis,
}

impl Primitive {
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Complex => "complex",
            Primitive::Bytes => "bytes",
            Primitive::Text => "str",
            Primitive::Path => "path",
            Primitive::None => "None",
            Primitive::Ellipsis => "ellipsis",
        }
    }
}

/// Structural description of a value's shape
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    /// An explicit wire format, standing on its own
    Format(Format),
    /// One presence byte, then the payload if present
    Optional(Box<TypeDescriptor>),
    /// VLQ variant index, then the payload of the selected variant
    Union(Vec<TypeDescriptor>),
    List(Box<TypeDescriptor>),
    Set(Box<TypeDescriptor>),
    FrozenSet(Box<TypeDescriptor>),
    /// Optional bound, then the payload of a list
    Deque(Box<TypeDescriptor>),
    Dict(Box<TypeDescriptor>, Box<TypeDescriptor>),
    /// Positional concatenation without a length prefix
    TupleFixed(Vec<TypeDescriptor>),
    /// Same wire shape as a list
    TupleVariadic(Box<TypeDescriptor>),
    /// Choice among constant values; zero bytes when there is only one
    Literal(Vec<Value>),
    Record(RecordDescriptor),
    /// Transparent renaming of the inner shape
    Alias(String, Box<TypeDescriptor>),
    /// Inner shape written in an explicit format
    Annotated(Box<TypeDescriptor>, Format),
    /// Reference to a type registered in the catalogue under this key
    Named(String),
    /// Registry key of the concrete type, then its payload
    LateBound,
    /// Explicitly requested opaque blob
    Opaque(BlobFormat),
}

impl TypeDescriptor {
    pub const BOOL: Self = Self::Primitive(Primitive::Bool);
    pub const INT: Self = Self::Primitive(Primitive::Int);
    pub const FLOAT: Self = Self::Primitive(Primitive::Float);
    pub const COMPLEX: Self = Self::Primitive(Primitive::Complex);
    pub const BYTES: Self = Self::Primitive(Primitive::Bytes);
    pub const TEXT: Self = Self::Primitive(Primitive::Text);
    pub const PATH: Self = Self::Primitive(Primitive::Path);
    pub const NONE: Self = Self::Primitive(Primitive::None);
    pub const ELLIPSIS: Self = Self::Primitive(Primitive::Ellipsis);

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(elem: TypeDescriptor) -> Self {
        Self::List(Box::new(elem))
    }

    pub fn set(elem: TypeDescriptor) -> Self {
        Self::Set(Box::new(elem))
    }

    pub fn frozen_set(elem: TypeDescriptor) -> Self {
        Self::FrozenSet(Box::new(elem))
    }

    pub fn deque(elem: TypeDescriptor) -> Self {
        Self::Deque(Box::new(elem))
    }

    pub fn dict(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Dict(Box::new(key), Box::new(value))
    }

    pub fn tuple_variadic(elem: TypeDescriptor) -> Self {
        Self::TupleVariadic(Box::new(elem))
    }

    pub fn alias(name: impl Into<String>, inner: TypeDescriptor) -> Self {
        Self::Alias(name.into(), Box::new(inner))
    }

    pub fn named(key: impl Into<String>) -> Self {
        Self::Named(key.into())
    }

    /// Attaches an explicit format to this shape
    #[must_use]
    pub fn with_format(self, format: Format) -> Self {
        Self::Annotated(Box::new(self), format)
    }
}

impl From<Primitive> for TypeDescriptor {
    fn from(p: Primitive) -> Self {
        Self::Primitive(p)
    }
}

impl From<Format> for TypeDescriptor {
    fn from(f: Format) -> Self {
        Self::Format(f)
    }
}

impl From<RecordDescriptor> for TypeDescriptor {
    fn from(r: RecordDescriptor) -> Self {
        Self::Record(r)
    }
}

/// One field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub descriptor: TypeDescriptor,
    /// Excluded fields are skipped on the wire in both directions
    pub included: bool,
    /// Explicit format override for this field
    pub format: Option<Format>,
    /// Value reconstructed for an excluded field when no post-decode hook
    /// is declared
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, descriptor: impl Into<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            included: true,
            format: None,
            default: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Marks the field as excluded from the wire
    #[must_use]
    pub fn excluded(mut self) -> Self {
        self.included = false;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Descriptor with the field-level override folded in
    pub fn effective_descriptor(&self) -> TypeDescriptor {
        match self.format {
            Some(f) => self.descriptor.clone().with_format(f),
            None => self.descriptor.clone(),
        }
    }
}

/// Ordered field list of a record type, with its optional capabilities
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    /// Key of a registered [`CustomCodec`](crate::registry::CustomCodec)
    /// that replaces field-wise encoding entirely
    pub custom: Option<String>,
    /// Key of a registered [`PostDecode`](crate::registry::PostDecode) hook
    pub hook: Option<String>,
}

impl RecordDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            custom: None,
            hook: None,
        }
    }

    /// Appends a field in wire order
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>) -> Self {
        self.custom = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_hook(mut self, key: impl Into<String>) -> Self {
        self.hook = Some(key.into());
        self
    }

    pub fn included(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.included)
    }
}

fn join<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> FmtResult {
    for (ix, item) in items.iter().enumerate() {
        if ix > 0 {
            f.write_str(", ")?;
        }
        Display::fmt(item, f)?;
    }
    Ok(())
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TypeDescriptor::Primitive(p) => f.write_str(p.name()),
            TypeDescriptor::Format(fmt) => write!(f, "<{fmt}>"),
            TypeDescriptor::Optional(t) => write!(f, "optional[{t}]"),
            TypeDescriptor::Union(ts) => {
                f.write_str("union[")?;
                join(f, ts)?;
                f.write_str("]")
            }
            TypeDescriptor::List(t) => write!(f, "list[{t}]"),
            TypeDescriptor::Set(t) => write!(f, "set[{t}]"),
            TypeDescriptor::FrozenSet(t) => write!(f, "frozenset[{t}]"),
            TypeDescriptor::Deque(t) => write!(f, "deque[{t}]"),
            TypeDescriptor::Dict(k, v) => write!(f, "dict[{k}, {v}]"),
            TypeDescriptor::TupleFixed(ts) if ts.is_empty() => f.write_str("tuple[()]"),
            TypeDescriptor::TupleFixed(ts) => {
                f.write_str("tuple[")?;
                join(f, ts)?;
                f.write_str("]")
            }
            TypeDescriptor::TupleVariadic(t) => write!(f, "tuple[{t}, ...]"),
            TypeDescriptor::Literal(vs) => {
                f.write_str("literal[")?;
                for (ix, v) in vs.iter().enumerate() {
                    if ix > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                f.write_str("]")
            }
            TypeDescriptor::Record(r) => Display::fmt(r, f),
            TypeDescriptor::Alias(_, t) => Display::fmt(t, f),
            TypeDescriptor::Annotated(t, fmt) => write!(f, "{t} as <{fmt}>"),
            TypeDescriptor::Named(key) => write!(f, "@{key}"),
            TypeDescriptor::LateBound => f.write_str("<type>"),
            TypeDescriptor::Opaque(b) => write!(f, "<{}>", b.as_format()),
        }
    }
}

impl Display for FieldSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.name)?;
        if !self.included {
            f.write_str("!")?;
        }
        write!(f, ": {}", self.descriptor)?;
        if let Some(fmt) = self.format {
            write!(f, " as <{fmt}>")?;
        }
        if let Some(default) = &self.default {
            write!(f, " = {default:?}")?;
        }
        Ok(())
    }
}

impl Display for RecordDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "record {}{{", self.name)?;
        join(f, &self.fields)?;
        f.write_str("}")?;
        if let Some(custom) = &self.custom {
            write!(f, " custom({custom})")?;
        }
        if let Some(hook) = &self.hook {
            write!(f, " hook({hook})")?;
        }
        Ok(())
    }
}
