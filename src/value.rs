//! Dynamic value tree
//!
//! [`Value`] is the in-memory form that every codec consumes on encode and
//! produces on decode. Its variants mirror the shapes a
//! [`TypeDescriptor`](crate::schema::TypeDescriptor) can describe, but a
//! value carries no wire information of its own: the same `Value::Int` may
//! be written as a single byte, a zig-zag VLQ or eight raw bytes depending
//! on the descriptor it is paired with.
//!
//! ## Ordering
//!
//! Set-like and map-like variants are backed by `Vec`s rather than hashed
//! collections. Their iteration order is the wire order, and the order in
//! which a decoder reconstructs them.
//!
//! ## Equality
//!
//! Equality is structural and never coerces: `Int(1) != Float(1.0)`, and
//! `List` and `Tuple` with the same elements are distinct. Floats follow
//! IEEE-754 semantics, so a `NaN` never compares equal to itself.

use std::path::PathBuf;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// A decoded or encodable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value
    None,
    /// The ellipsis marker
    Ellipsis,
    Bool(bool),
    /// Machine integer, wide enough for the whole of both `u64` and `i64`
    Int(i128),
    /// Arbitrary-precision integer, used by the unbounded VLQ formats
    BigInt(BigInt),
    Float(f64),
    Complex {
        re: f64,
        im: f64,
    },
    Bytes(Vec<u8>),
    Text(String),
    Path(PathBuf),
    List(Vec<Value>),
    Set(Vec<Value>),
    FrozenSet(Vec<Value>),
    /// Double-ended queue with an optional bound on its length
    Deque {
        maxlen: Option<u64>,
        items: Vec<Value>,
    },
    Dict(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
    Record(Record),
    /// Late-bound payload, tagged with the registry key of its type
    Tagged {
        key: String,
        value: Box<Value>,
    },
    /// Generic self-contained text blob
    Json(#[serde(with = "json_text")] serde_json::Value),
}

/// Named product of field values
///
/// Fields are kept in declaration order. A record decoded without a
/// post-decode hook holds every declared field, including excluded ones
/// reconstructed from their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field, builder-style
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Looks up a field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }
}

impl Value {
    /// Returns the variant name (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Ellipsis => "Ellipsis",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::BigInt(_) => "BigInt",
            Value::Float(_) => "Float",
            Value::Complex { .. } => "Complex",
            Value::Bytes(_) => "Bytes",
            Value::Text(_) => "Text",
            Value::Path(_) => "Path",
            Value::List(_) => "List",
            Value::Set(_) => "Set",
            Value::FrozenSet(_) => "FrozenSet",
            Value::Deque { .. } => "Deque",
            Value::Dict(_) => "Dict",
            Value::Tuple(_) => "Tuple",
            Value::Record(_) => "Record",
            Value::Tagged { .. } => "Tagged",
            Value::Json(_) => "Json",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Elements of any list-like variant, in wire order
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(xs)
            | Value::Set(xs)
            | Value::FrozenSet(xs)
            | Value::Tuple(xs)
            | Value::Deque { items: xs, .. } => Some(xs),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_ints {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Int(i128::from(i))
                }
            }
        )+
    };
}

from_ints!(u8, u16, u32, u64, i8, i16, i32, i64);

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::BigInt(i)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::None, Into::into)
    }
}

/// Serializes an embedded JSON document as its text form, so that formats
/// without self-description (such as `bincode`) can carry it.
mod json_text {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &serde_json::Value, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<serde_json::Value, D::Error> {
        let text = String::deserialize(d)?;
        serde_json::from_str(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_coercion() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Text("abc".into()), Value::Bytes(b"abc".to_vec()));
        assert_ne!(Value::List(vec![]), Value::Tuple(vec![]));
    }

    #[test]
    fn option_into_value() {
        assert_eq!(Value::from(None::<u8>), Value::None);
        assert_eq!(Value::from(Some(34u8)), Value::Int(34));
    }

    #[test]
    fn record_lookup() {
        let rec = Record::new("Person").with("age", 34u8).with("name", "John Doe");
        assert_eq!(rec.get("name"), Some(&Value::Text("John Doe".into())));
        assert_eq!(rec.get("email"), None);
    }

    #[test]
    fn json_survives_bincode() {
        let v = Value::Json(serde_json::json!({"a": [1, 2, null]}));
        let bytes = bincode::serialize(&v).unwrap();
        assert_eq!(bincode::deserialize::<Value>(&bytes).unwrap(), v);
    }
}
