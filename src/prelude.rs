//! Glob-importable set of the types most callers need

pub use crate::error::{Error, Result, UsageError};
pub use crate::format::{BlobFormat, Format};
pub use crate::parse::error::{DecodeError, DecodeErrorKind};
pub use crate::registry::{CustomCodec, FormatRegistry, PostDecode};
pub use crate::schema::{FieldSpec, Primitive, RecordDescriptor, TypeDescriptor};
pub use crate::value::{Record, Value};
