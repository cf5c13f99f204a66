//! Record codec
//!
//! A record is written as the concatenation of its included fields'
//! payloads, in declared order, with no framing of its own. Excluded fields
//! never touch the wire; on decode they are either handed back from their
//! declared default or, when the record declares a post-decode hook, left
//! for the hook to reconstruct.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use super::Codec;
use crate::builder::strict::StrictBuilder;
use crate::error::{UsageError, UsageResult};
use crate::parse::error::{DecodeError, DecodeErrorKind, ParseResult, PathSegment, ResultExt};
use crate::parse::{ByteParser, Parser};
use crate::registry::{FormatRegistry, PostDecode};
use crate::value::{Record, Value};

/// Resolved field of a record
#[derive(Debug, Clone)]
pub struct FieldCodec {
    pub(crate) name: String,
    /// `None` for excluded fields
    pub(crate) codec: Option<Arc<Codec>>,
    pub(crate) default: Option<Value>,
}

/// Shared handle on a registered [`PostDecode`] hook
#[derive(Clone)]
pub struct HookRef(pub(crate) Arc<dyn PostDecode>);

impl Debug for HookRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("PostDecode")
    }
}

#[derive(Debug, Clone)]
pub struct RecordCodec {
    name: String,
    fields: Vec<FieldCodec>,
    hook: Option<HookRef>,
}

impl RecordCodec {
    pub(crate) fn new(name: String, fields: Vec<FieldCodec>, hook: Option<HookRef>) -> Self {
        Self { name, fields, hook }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `record` names this type and every included field it carries
    /// fits that field's codec
    pub(crate) fn accepts(&self, record: &Record) -> bool {
        record.type_name == self.name
            && self.fields.iter().all(|field| match &field.codec {
                Some(codec) => record.get(&field.name).map_or(false, |v| codec.accepts(v)),
                None => true,
            })
    }

    pub(crate) fn min_width(&self) -> usize {
        self.fields
            .iter()
            .filter_map(|f| f.codec.as_deref())
            .map(Codec::min_width)
            .sum()
    }

    pub(crate) fn encode(
        &self,
        reg: &FormatRegistry,
        value: &Value,
        out: &mut StrictBuilder,
    ) -> UsageResult<()> {
        let record = match value {
            Value::Record(r) if r.type_name == self.name => r,
            other => {
                return Err(UsageError::mismatch(
                    format_args!("record `{}`", self.name),
                    other,
                ))
            }
        };
        for field in &self.fields {
            let Some(codec) = &field.codec else { continue };
            let v = record.get(&field.name).ok_or_else(|| UsageError::MissingField {
                record: self.name.clone(),
                field: field.name.clone(),
            })?;
            codec.encode(reg, v, out)?;
        }
        Ok(())
    }

    pub(crate) fn decode(&self, reg: &FormatRegistry, p: &mut ByteParser<'_>) -> ParseResult<Value> {
        let start = p.offset();
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match (&field.codec, &field.default) {
                (Some(codec), _) => {
                    let v = codec
                        .decode(reg, p)
                        .within(|| PathSegment::Field(field.name.clone()))?;
                    fields.push((field.name.clone(), v));
                }
                (None, Some(default)) if self.hook.is_none() => {
                    fields.push((field.name.clone(), default.clone()));
                }
                (None, _) => {}
            }
        }
        match &self.hook {
            Some(hook) => hook.0.construct(&self.name, fields).map_err(|msg| {
                DecodeError::new(DecodeErrorKind::Rejected(msg), start)
                    .within(PathSegment::Type(self.name.clone()))
            }),
            None => Ok(Value::Record(Record {
                type_name: self.name.clone(),
                fields,
            })),
        }
    }
}
