//! MongoDB datatype mapping
//!
//! | datatype | bson |
//! |---|---|
//! | u8, u16, i8, i16, i32 | int32 |
//! | u32, i64 | int64 |
//! | u64, u128, i128 | fixed-width sortable string |
//! | f32, f64 | double |
//! | boolean | boolean |
//! | datetime | date (milliseconds) |
//! | string, url | string |
//! | blob | binary, generic subtype |

use chrono::{TimeZone, Utc};
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{Binary, Bson, DateTime as BsonDateTime};
use quarry_core::{sortable, DataType, Result, TypeMap, Value};
use url::Url;

const ENGINE: &str = "mongodb";

#[derive(Debug, Clone, Copy, Default)]
pub struct MongoTypes;

impl TypeMap for MongoTypes {
    type Wire = Bson;

    fn engine(&self) -> &'static str {
        ENGINE
    }

    /// BSON type name; collections are schemaless
    fn column(&self, datatype: DataType) -> &'static str {
        match datatype {
            DataType::U8 | DataType::U16 | DataType::I8 | DataType::I16 | DataType::I32 => "int",
            DataType::U32 | DataType::I64 => "long",
            DataType::F32 | DataType::F64 => "double",
            DataType::Boolean => "bool",
            DataType::DateTime => "date",
            DataType::Blob => "binData",
            _ => "string",
        }
    }

    fn bind(&self, datatype: DataType, value: &Value) -> Result<Bson> {
        if value.is_null() {
            return Ok(Bson::Null);
        }
        let wire = match datatype {
            t if t.is_text_bigint() => sortable::encode(t, value).map(Bson::String),
            DataType::U32 | DataType::I64 => value
                .as_i128()
                .and_then(|i| i64::try_from(i).ok())
                .map(Bson::Int64),
            t if t.is_integer() => value
                .as_i128()
                .and_then(|i| i32::try_from(i).ok())
                .map(Bson::Int32),
            DataType::F32 | DataType::F64 => value.as_f64().map(Bson::Double),
            DataType::Boolean => match value {
                Value::Bool(b) => Some(Bson::Boolean(*b)),
                _ => None,
            },
            DataType::DateTime => match value {
                Value::DateTime(dt) => {
                    Some(Bson::DateTime(BsonDateTime::from_millis(dt.timestamp_millis())))
                }
                _ => None,
            },
            DataType::Url => match value {
                Value::Url(url) => Some(Bson::String(url.to_string())),
                _ => None,
            },
            DataType::Blob => match value {
                Value::Blob(bytes) => Some(Bson::Binary(Binary {
                    subtype: BinarySubtype::Generic,
                    bytes: bytes.clone(),
                })),
                _ => None,
            },
            _ => value.as_str().map(|s| Bson::String(s.to_string())),
        };
        wire.ok_or_else(|| self.unsupported(datatype, value))
    }

    fn unbind(&self, datatype: DataType, wire: Bson) -> Result<Value> {
        let value = match (datatype, wire) {
            (_, Bson::Null | Bson::Undefined) => return Ok(Value::Null),
            (t, Bson::String(text)) if t.is_text_bigint() => {
                return sortable::decode(ENGINE, t.name(), t, &text);
            }
            (t, Bson::Int32(i)) if t.is_integer() => Value::Int(i128::from(i)),
            (t, Bson::Int64(i)) if t.is_integer() => Value::Int(i128::from(i)),
            (DataType::F32 | DataType::F64, Bson::Double(f)) => Value::Float(f),
            (DataType::F32 | DataType::F64, Bson::Int32(i)) => Value::Float(f64::from(i)),
            (DataType::F32 | DataType::F64, Bson::Int64(i)) => Value::Float(i as f64),
            (DataType::Boolean, Bson::Boolean(b)) => Value::Bool(b),
            (DataType::DateTime, Bson::DateTime(dt)) => Utc
                .timestamp_millis_opt(dt.timestamp_millis())
                .single()
                .map(Value::DateTime)
                .ok_or_else(|| self.undecodable(datatype, format!("date out of range: {dt}")))?,
            (DataType::Url, Bson::String(text)) => Url::parse(&text)
                .map(Value::Url)
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (DataType::String, Bson::String(text)) => Value::String(text),
            (DataType::Blob, Bson::Binary(binary)) => Value::Blob(binary.bytes),
            (_, other) => {
                let found = format!("unexpected {:?}", other.element_type());
                return Err(self.undecodable(datatype, found));
            }
        };
        value
            .conform(datatype.name(), datatype)
            .map_err(|e| self.undecodable(datatype, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DataType::U8, Value::UInt(7))]
    #[test_case(DataType::U32, Value::UInt(u32::MAX as u128))]
    #[test_case(DataType::I32, Value::Int(i32::MIN as i128))]
    #[test_case(DataType::I64, Value::Int(i64::MAX as i128))]
    #[test_case(DataType::U64, Value::UInt(u64::MAX as u128))]
    #[test_case(DataType::I128, Value::Int(-1))]
    #[test_case(DataType::F32, Value::Float(1.5))]
    #[test_case(DataType::Boolean, Value::Bool(true))]
    #[test_case(DataType::String, Value::from("ünï"))]
    #[test_case(DataType::Blob, Value::Blob(vec![1, 2, 3]))]
    fn round_trips(datatype: DataType, value: Value) {
        let wire = MongoTypes.bind(datatype, &value).unwrap();
        assert_eq!(MongoTypes.unbind(datatype, wire).unwrap(), value);
    }

    #[test]
    fn u32_needs_a_long() {
        let wire = MongoTypes.bind(DataType::U32, &Value::UInt(u32::MAX as u128)).unwrap();
        assert_eq!(wire, Bson::Int64(u32::MAX as i64));
    }

    #[test]
    fn datetimes_are_bson_dates() {
        let dt = Utc.with_ymd_and_hms(2020, 5, 6, 7, 8, 9).unwrap()
            + chrono::Duration::milliseconds(10);
        let wire = MongoTypes.bind(DataType::DateTime, &Value::DateTime(dt)).unwrap();
        assert!(matches!(wire, Bson::DateTime(_)));
        assert_eq!(
            MongoTypes.unbind(DataType::DateTime, wire).unwrap(),
            Value::DateTime(dt)
        );
    }

    #[test]
    fn wrong_bson_type_is_a_decode_error() {
        let err = MongoTypes
            .unbind(DataType::Boolean, Bson::String("true".into()))
            .unwrap_err();
        assert_eq!(err.code(), "decode");
    }
}
