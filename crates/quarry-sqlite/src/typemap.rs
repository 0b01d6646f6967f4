//! SQLite datatype mapping
//!
//! | datatype | column | wire |
//! |---|---|---|
//! | u8..u32, i8..i64 | INTEGER | integer |
//! | u64, u128, i128 | TEXT | fixed-width sortable text |
//! | f32, f64 | REAL | real |
//! | boolean | INTEGER | 0 / 1 |
//! | datetime | TEXT | RFC 3339, milliseconds, `Z` |
//! | string, url | TEXT | text |
//! | blob | BLOB | blob |

use chrono::{DateTime, SecondsFormat, Utc};
use quarry_core::{sortable, DataType, Result, TypeMap, Value};
use rusqlite::types::Value as SqlValue;
use url::Url;

const ENGINE: &str = "sqlite";

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTypes;

impl TypeMap for SqliteTypes {
    type Wire = SqlValue;

    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn column(&self, datatype: DataType) -> &'static str {
        match datatype {
            t if t.is_text_bigint() => "TEXT",
            t if t.is_integer() => "INTEGER",
            DataType::F32 | DataType::F64 => "REAL",
            DataType::Boolean => "INTEGER",
            DataType::Blob => "BLOB",
            _ => "TEXT",
        }
    }

    fn bind(&self, datatype: DataType, value: &Value) -> Result<SqlValue> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        let wire = match datatype {
            t if t.is_text_bigint() => sortable::encode(t, value).map(SqlValue::Text),
            t if t.is_integer() => value
                .as_i128()
                .and_then(|i| i64::try_from(i).ok())
                .map(SqlValue::Integer),
            DataType::F32 | DataType::F64 => value.as_f64().map(SqlValue::Real),
            DataType::Boolean => match value {
                Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
                _ => None,
            },
            DataType::DateTime => match value {
                Value::DateTime(dt) => Some(SqlValue::Text(
                    dt.to_rfc3339_opts(SecondsFormat::Millis, true),
                )),
                _ => None,
            },
            DataType::Url => match value {
                Value::Url(url) => Some(SqlValue::Text(url.to_string())),
                _ => None,
            },
            DataType::Blob => match value {
                Value::Blob(bytes) => Some(SqlValue::Blob(bytes.clone())),
                _ => None,
            },
            _ => value.as_str().map(|s| SqlValue::Text(s.to_string())),
        };
        wire.ok_or_else(|| self.unsupported(datatype, value))
    }

    fn unbind(&self, datatype: DataType, wire: SqlValue) -> Result<Value> {
        let value = match (datatype, wire) {
            (_, SqlValue::Null) => return Ok(Value::Null),
            (t, SqlValue::Text(text)) if t.is_text_bigint() => {
                return sortable::decode(ENGINE, t.name(), t, &text);
            }
            (t, SqlValue::Integer(i)) if t.is_integer() => Value::Int(i128::from(i)),
            (DataType::F32 | DataType::F64, SqlValue::Real(f)) => Value::Float(f),
            (DataType::F32 | DataType::F64, SqlValue::Integer(i)) => Value::Float(i as f64),
            (DataType::Boolean, SqlValue::Integer(i)) => Value::Bool(i != 0),
            (DataType::DateTime, SqlValue::Text(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (DataType::Url, SqlValue::Text(text)) => Url::parse(&text)
                .map(Value::Url)
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (DataType::String, SqlValue::Text(text)) => Value::String(text),
            (DataType::Blob, SqlValue::Blob(bytes)) => Value::Blob(bytes),
            (_, other) => {
                let found = format!("unexpected {:?}", other.data_type());
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
    use chrono::TimeZone;
    use test_case::test_case;

    #[test_case(DataType::U8, Value::UInt(0))]
    #[test_case(DataType::U8, Value::UInt(255))]
    #[test_case(DataType::U32, Value::UInt(u32::MAX as u128))]
    #[test_case(DataType::I8, Value::Int(-128))]
    #[test_case(DataType::I64, Value::Int(i64::MIN as i128))]
    #[test_case(DataType::I64, Value::Int(i64::MAX as i128))]
    #[test_case(DataType::U64, Value::UInt(u64::MAX as u128))]
    #[test_case(DataType::U128, Value::UInt(u128::MAX))]
    #[test_case(DataType::I128, Value::Int(i128::MIN))]
    #[test_case(DataType::I128, Value::Int(i128::MAX))]
    #[test_case(DataType::F64, Value::Float(-1.5))]
    #[test_case(DataType::Boolean, Value::Bool(true))]
    #[test_case(DataType::String, Value::from("naïve 🦀"))]
    #[test_case(DataType::Blob, Value::Blob(vec![0, 159, 255]))]
    fn round_trips(datatype: DataType, value: Value) {
        let wire = SqliteTypes.bind(datatype, &value).unwrap();
        assert_eq!(SqliteTypes.unbind(datatype, wire).unwrap(), value);
    }

    #[test]
    fn datetime_and_url_round_trip() {
        let dt = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap()
            + chrono::Duration::milliseconds(123);
        let value = Value::DateTime(dt);
        let wire = SqliteTypes.bind(DataType::DateTime, &value).unwrap();
        assert_eq!(wire, SqlValue::Text("2024-02-29T23:59:58.123Z".into()));
        assert_eq!(SqliteTypes.unbind(DataType::DateTime, wire).unwrap(), value);

        let url = Value::Url(Url::parse("https://example.com/a?b=c").unwrap());
        let wire = SqliteTypes.bind(DataType::Url, &url).unwrap();
        assert_eq!(SqliteTypes.unbind(DataType::Url, wire).unwrap(), url);
    }

    #[test]
    fn wide_integers_sort_as_text() {
        let nine = SqliteTypes.bind(DataType::U64, &Value::UInt(9)).unwrap();
        let ten = SqliteTypes.bind(DataType::U64, &Value::UInt(10)).unwrap();
        match (nine, ten) {
            (SqlValue::Text(a), SqlValue::Text(b)) => assert!(a < b),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_integers_fail_to_decode() {
        let err = SqliteTypes
            .unbind(DataType::U8, SqlValue::Integer(300))
            .unwrap_err();
        assert_eq!(err.code(), "decode");
    }
}
