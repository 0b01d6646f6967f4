//! Values and records
//!
//! [`Value`] is the engine-neutral scalar every adapter binds from and
//! unbinds into. Integers are kept at full width (`i128`/`u128`) so that
//! 64 and 128-bit keys survive every engine exactly.

use crate::datatype::DataType;
use crate::error::{QuarryError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use url::Url;

/// A scalar field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    /// Any signed integer
    Int(i128),
    /// Any unsigned integer
    UInt(u128),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Url(Url),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value's kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Url(_) => "url",
            Self::Blob(_) => "blob",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a signed integer, when it is an integer that fits
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i128::try_from(*u).ok(),
            _ => None,
        }
    }

    /// The value as an unsigned integer, when it is a non-negative integer
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Self::UInt(u) => Some(*u),
            Self::Int(i) => u128::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    /// Validate this value against `datatype` and return its canonical form
    ///
    /// Signed integer datatypes canonicalize to [`Value::Int`], unsigned ones
    /// to [`Value::UInt`]. Datetimes are truncated to milliseconds, the finest
    /// precision every engine stores. `Null` passes through; nullability is
    /// the caller's concern.
    pub fn conform(self, field: &str, datatype: DataType) -> Result<Value> {
        let invalid = |value: &Value| QuarryError::ValueInvalid {
            field: field.to_string(),
            datatype: datatype.name().to_string(),
            got: value.describe(),
        };

        if self.is_null() {
            return Ok(self);
        }

        match datatype {
            DataType::String => match self {
                Self::String(_) => Ok(self),
                other => Err(invalid(&other)),
            },
            t if t.is_signed() => {
                let (min, max) = t.signed_range().ok_or_else(|| invalid(&self))?;
                match self.as_i128() {
                    Some(i) if i >= min && i <= max => Ok(Self::Int(i)),
                    _ => Err(invalid(&self)),
                }
            }
            t if t.is_unsigned() => {
                let max = t.unsigned_max().ok_or_else(|| invalid(&self))?;
                match self.as_u128() {
                    Some(u) if u <= max => Ok(Self::UInt(u)),
                    _ => Err(invalid(&self)),
                }
            }
            DataType::F32 => match self.as_f64() {
                Some(f) if f.is_finite() && f.abs() <= f32::MAX as f64 => {
                    Ok(Self::Float(f as f32 as f64))
                }
                _ => Err(invalid(&self)),
            },
            DataType::F64 => match self.as_f64() {
                Some(f) if f.is_finite() => Ok(Self::Float(f)),
                _ => Err(invalid(&self)),
            },
            DataType::Boolean => match self {
                Self::Bool(_) => Ok(self),
                other => Err(invalid(&other)),
            },
            DataType::DateTime => match self {
                Self::DateTime(dt) => Ok(Self::DateTime(dt.trunc_subsecs(3))),
                Self::String(ref s) => DateTime::parse_from_rfc3339(s)
                    .map(|dt| Self::DateTime(dt.with_timezone(&Utc).trunc_subsecs(3)))
                    .map_err(|_| invalid(&self)),
                other => Err(invalid(&other)),
            },
            DataType::Url => match self {
                Self::Url(_) => Ok(self),
                Self::String(ref s) => Url::parse(s).map(Self::Url).map_err(|_| invalid(&self)),
                other => Err(invalid(&other)),
            },
            DataType::Blob => match self {
                Self::Blob(_) => Ok(self),
                other => Err(invalid(&other)),
            },
            _ => Err(invalid(&self)),
        }
    }

    /// Order two values of compatible kinds
    ///
    /// Returns `None` for incomparable kinds (including `Null`).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::UInt(a), Self::UInt(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::UInt(b)) => Some(compare_mixed(*a, *b)),
            (Self::UInt(a), Self::Int(b)) => Some(compare_mixed(*b, *a).reverse()),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Float(a), b) => b.as_f64().and_then(|b| a.partial_cmp(&b)),
            (a, Self::Float(b)) => a.as_f64().and_then(|a| a.partial_cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Url(a), Self::Url(b)) => Some(a.as_str().cmp(b.as_str())),
            (Self::Blob(a), Self::Blob(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality across integer representations
    pub fn same(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    fn describe(&self) -> String {
        match self {
            Self::Null | Self::Blob(_) => self.kind().to_string(),
            other => format!("{} {}", other.kind(), other),
        }
    }
}

fn compare_mixed(signed: i128, unsigned: u128) -> Ordering {
    match u128::try_from(signed) {
        Ok(s) => s.cmp(&unsigned),
        Err(_) => Ordering::Less,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Self::Url(u) => f.write_str(u.as_str()),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(v as i128)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::UInt(v as u128)
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, i128);
from_unsigned!(u8, u16, u32, u64, u128);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<Url> for Value {
    fn from(v: Url) -> Self {
        Self::Url(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Records loaded through a relation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Related {
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Related {
    pub fn as_many(&self) -> Option<&[Record]> {
        match self {
            Self::Many(rows) => Some(rows),
            Self::One(_) => None,
        }
    }

    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Self::One(row) => row.as_deref(),
            Self::Many(_) => None,
        }
    }
}

/// An ordered set of field values plus any loaded relations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    fields: IndexMap<String, Value>,
    #[serde(flatten)]
    relations: IndexMap<String, Related>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.fields.retain(|k, v| keep(k, v));
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn set_related(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    pub fn relations(&self) -> impl Iterator<Item = (&String, &Related)> {
        self.relations.iter()
    }

    pub fn into_fields(self) -> IndexMap<String, Value> {
        self.fields
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Build a [`Record`] from `field => value` pairs
///
/// ```
/// use quarry_core::record;
///
/// let donald = record! { "name" => "Donald", "age" => 30u8 };
/// assert_eq!(donald.len(), 2);
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert($field, $value); )+
        record
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    #[test_case(Value::UInt(255), DataType::U8, Some(Value::UInt(255)) ; "u8 max")]
    #[test_case(Value::UInt(256), DataType::U8, None ; "u8 overflow")]
    #[test_case(Value::Int(5), DataType::U8, Some(Value::UInt(5)) ; "signed literal to unsigned")]
    #[test_case(Value::Int(-1), DataType::U64, None ; "negative unsigned")]
    #[test_case(Value::Int(i128::MIN), DataType::I128, Some(Value::Int(i128::MIN)) ; "i128 min")]
    #[test_case(Value::UInt(u128::MAX), DataType::U128, Some(Value::UInt(u128::MAX)) ; "u128 max")]
    #[test_case(Value::UInt(128), DataType::I8, None ; "i8 overflow")]
    #[test_case(Value::Int(3), DataType::F64, Some(Value::Float(3.0)) ; "integer into float")]
    #[test_case(Value::from("x"), DataType::U8, None ; "string into integer")]
    #[test_case(Value::Float(1.5), DataType::I32, None ; "float into integer")]
    fn conform(value: Value, datatype: DataType, expected: Option<Value>) {
        let result = value.conform("f", datatype);
        match expected {
            Some(v) => assert_eq!(result.unwrap(), v),
            None => assert_eq!(result.unwrap_err().code(), "value_invalid"),
        }
    }

    #[test]
    fn datetime_is_truncated_to_millis() {
        let dt = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let conformed = Value::DateTime(dt).conform("at", DataType::DateTime).unwrap();
        let Value::DateTime(out) = conformed else {
            panic!("expected datetime");
        };
        assert_eq!(out.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn strings_parse_into_datetime_and_url() {
        let at = Value::from("2024-01-02T03:04:05Z")
            .conform("at", DataType::DateTime)
            .unwrap();
        assert!(matches!(at, Value::DateTime(_)));

        let url = Value::from("https://example.com/a")
            .conform("home", DataType::Url)
            .unwrap();
        assert!(matches!(url, Value::Url(_)));

        assert!(Value::from("not a url").conform("home", DataType::Url).is_err());
    }

    #[test]
    fn mixed_integer_comparison() {
        assert_eq!(Value::Int(-1).compare(&Value::UInt(0)), Some(Ordering::Less));
        assert!(Value::Int(7).same(&Value::UInt(7)));
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn record_macro_keeps_order() {
        let r = record! { "b" => 1u8, "a" => "x" };
        let keys: Vec<_> = r.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn record_serializes_flat() {
        let mut r = record! { "id" => "u1", "name" => "Donald" };
        r.set_related("posts", Related::Many(vec![record! { "title" => "Hi" }]));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "u1", "name": "Donald", "posts": [{"title": "Hi"}]})
        );
    }
}
