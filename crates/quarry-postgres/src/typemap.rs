//! PostgreSQL datatype mapping
//!
//! | datatype | column | wire |
//! |---|---|---|
//! | u8, i8, i16 | SMALLINT | int2 |
//! | u16, i32 | INTEGER | int4 |
//! | u32, i64 | BIGINT | int8 |
//! | u64 | NUMERIC(20,0) | decimal text |
//! | u128, i128 | NUMERIC(39,0) | decimal text |
//! | f32 | REAL | float4 |
//! | f64 | DOUBLE PRECISION | float8 |
//! | boolean | BOOLEAN | bool |
//! | datetime | TIMESTAMPTZ | timestamptz |
//! | string, url | TEXT | text |
//! | blob | BYTEA | bytea |
//!
//! Unsigned types take the next wider signed column, so every value fits.

use chrono::{DateTime, Utc};
use quarry_core::{DataType, Result, TypeMap, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::Row;
use url::Url;

const ENGINE: &str = "postgres";

/// A value as sent to or read from PostgreSQL
#[derive(Debug, Clone, PartialEq)]
pub enum PgWire {
    Null,
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Timestamptz(DateTime<Utc>),
}

impl PgWire {
    /// Append this value to `query`
    pub fn bind_to<'q>(
        self,
        query: Query<'q, sqlx::Postgres, PgArguments>,
    ) -> Query<'q, sqlx::Postgres, PgArguments> {
        match self {
            Self::Null => query.bind(None::<String>),
            Self::I16(v) => query.bind(v),
            Self::I32(v) => query.bind(v),
            Self::I64(v) => query.bind(v),
            Self::F32(v) => query.bind(v),
            Self::F64(v) => query.bind(v),
            Self::Bool(v) => query.bind(v),
            Self::Text(v) => query.bind(v),
            Self::Bytes(v) => query.bind(v),
            Self::Timestamptz(v) => query.bind(v),
        }
    }
}

fn wire<T>(value: Option<T>, f: impl FnOnce(T) -> PgWire) -> PgWire {
    value.map_or(PgWire::Null, f)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PgTypes;

impl PgTypes {
    /// Read column `index` of `row` as the wire form of `datatype`
    pub fn read(&self, row: &PgRow, index: usize, datatype: DataType) -> Result<Value> {
        let decoded = match datatype {
            DataType::U8 | DataType::I8 | DataType::I16 => {
                row.try_get::<Option<i16>, _>(index).map(|v| wire(v, PgWire::I16))
            }
            DataType::U16 | DataType::I32 => {
                row.try_get::<Option<i32>, _>(index).map(|v| wire(v, PgWire::I32))
            }
            DataType::U32 | DataType::I64 => {
                row.try_get::<Option<i64>, _>(index).map(|v| wire(v, PgWire::I64))
            }
            DataType::F32 => row.try_get::<Option<f32>, _>(index).map(|v| wire(v, PgWire::F32)),
            DataType::F64 => row.try_get::<Option<f64>, _>(index).map(|v| wire(v, PgWire::F64)),
            DataType::Boolean => {
                row.try_get::<Option<bool>, _>(index).map(|v| wire(v, PgWire::Bool))
            }
            DataType::DateTime => row
                .try_get::<Option<DateTime<Utc>>, _>(index)
                .map(|v| wire(v, PgWire::Timestamptz)),
            DataType::Blob => {
                row.try_get::<Option<Vec<u8>>, _>(index).map(|v| wire(v, PgWire::Bytes))
            }
            // Wide integers are read through `::text`
            _ => row.try_get::<Option<String>, _>(index).map(|v| wire(v, PgWire::Text)),
        };
        let wire = decoded.map_err(|e| self.undecodable(datatype, e.to_string()))?;
        self.unbind(datatype, wire)
    }
}

impl TypeMap for PgTypes {
    type Wire = PgWire;

    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn column(&self, datatype: DataType) -> &'static str {
        match datatype {
            DataType::U8 | DataType::I8 | DataType::I16 => "SMALLINT",
            DataType::U16 | DataType::I32 => "INTEGER",
            DataType::U32 | DataType::I64 => "BIGINT",
            DataType::U64 => "NUMERIC(20,0)",
            DataType::U128 | DataType::I128 => "NUMERIC(39,0)",
            DataType::F32 => "REAL",
            DataType::F64 => "DOUBLE PRECISION",
            DataType::Boolean => "BOOLEAN",
            DataType::DateTime => "TIMESTAMPTZ",
            DataType::Blob => "BYTEA",
            DataType::String | DataType::Url => "TEXT",
        }
    }

    fn bind(&self, datatype: DataType, value: &Value) -> Result<PgWire> {
        if value.is_null() {
            return Ok(PgWire::Null);
        }
        let int = value.as_i128();
        let wire = match datatype {
            DataType::U8 | DataType::I8 | DataType::I16 => {
                int.and_then(|i| i16::try_from(i).ok()).map(PgWire::I16)
            }
            DataType::U16 | DataType::I32 => {
                int.and_then(|i| i32::try_from(i).ok()).map(PgWire::I32)
            }
            DataType::U32 | DataType::I64 => {
                int.and_then(|i| i64::try_from(i).ok()).map(PgWire::I64)
            }
            DataType::U64 | DataType::U128 => value.as_u128().map(|u| PgWire::Text(u.to_string())),
            DataType::I128 => int.map(|i| PgWire::Text(i.to_string())),
            DataType::F32 => value.as_f64().map(|f| PgWire::F32(f as f32)),
            DataType::F64 => value.as_f64().map(PgWire::F64),
            DataType::Boolean => match value {
                Value::Bool(b) => Some(PgWire::Bool(*b)),
                _ => None,
            },
            DataType::DateTime => match value {
                Value::DateTime(dt) => Some(PgWire::Timestamptz(*dt)),
                _ => None,
            },
            DataType::Url => match value {
                Value::Url(url) => Some(PgWire::Text(url.to_string())),
                _ => None,
            },
            DataType::Blob => match value {
                Value::Blob(bytes) => Some(PgWire::Bytes(bytes.clone())),
                _ => None,
            },
            DataType::String => value.as_str().map(|s| PgWire::Text(s.to_string())),
        };
        wire.ok_or_else(|| self.unsupported(datatype, value))
    }

    fn unbind(&self, datatype: DataType, wire: PgWire) -> Result<Value> {
        let value = match (datatype, wire) {
            (_, PgWire::Null) => return Ok(Value::Null),
            (_, PgWire::I16(i)) => Value::Int(i128::from(i)),
            (_, PgWire::I32(i)) => Value::Int(i128::from(i)),
            (_, PgWire::I64(i)) => Value::Int(i128::from(i)),
            (t, PgWire::Text(text)) if t.is_text_bigint() => {
                let parsed = if t.is_unsigned() {
                    text.parse::<u128>().map(Value::UInt).map_err(|e| e.to_string())
                } else {
                    text.parse::<i128>().map(Value::Int).map_err(|e| e.to_string())
                };
                parsed.map_err(|e| self.undecodable(datatype, e))?
            }
            (DataType::F32, PgWire::F32(f)) => Value::Float(f64::from(f)),
            (DataType::F64, PgWire::F64(f)) => Value::Float(f),
            (DataType::Boolean, PgWire::Bool(b)) => Value::Bool(b),
            (DataType::DateTime, PgWire::Timestamptz(dt)) => Value::DateTime(dt),
            (DataType::Url, PgWire::Text(text)) => Url::parse(&text)
                .map(Value::Url)
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (DataType::String, PgWire::Text(text)) => Value::String(text),
            (DataType::Blob, PgWire::Bytes(bytes)) => Value::Blob(bytes),
            (_, other) => return Err(self.undecodable(datatype, format!("unexpected {other:?}"))),
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

    #[test_case(DataType::U8, Value::UInt(255), PgWire::I16(255))]
    #[test_case(DataType::U16, Value::UInt(65535), PgWire::I32(65535))]
    #[test_case(DataType::U32, Value::UInt(u32::MAX as u128), PgWire::I64(u32::MAX as i64))]
    #[test_case(DataType::I64, Value::Int(i64::MIN as i128), PgWire::I64(i64::MIN))]
    #[test_case(DataType::U64, Value::UInt(u64::MAX as u128), PgWire::Text("18446744073709551615".into()))]
    #[test_case(DataType::I128, Value::Int(i128::MIN), PgWire::Text(i128::MIN.to_string()))]
    #[test_case(DataType::U128, Value::UInt(u128::MAX), PgWire::Text(u128::MAX.to_string()))]
    #[test_case(DataType::F64, Value::Float(0.25), PgWire::F64(0.25))]
    #[test_case(DataType::Boolean, Value::Bool(false), PgWire::Bool(false))]
    #[test_case(DataType::String, Value::from("Zoë"), PgWire::Text("Zoë".into()))]
    #[test_case(DataType::Blob, Value::Blob(vec![0, 1, 255]), PgWire::Bytes(vec![0, 1, 255]))]
    fn round_trips(datatype: DataType, value: Value, expected: PgWire) {
        let wire = PgTypes.bind(datatype, &value).unwrap();
        assert_eq!(wire, expected);
        assert_eq!(PgTypes.unbind(datatype, wire).unwrap(), value);
    }

    #[test]
    fn datetimes_keep_milliseconds() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(678);
        let wire = PgTypes.bind(DataType::DateTime, &Value::DateTime(dt)).unwrap();
        assert_eq!(
            PgTypes.unbind(DataType::DateTime, wire).unwrap(),
            Value::DateTime(dt)
        );
    }

    #[test]
    fn values_outside_the_column_fail_to_decode() {
        let err = PgTypes.unbind(DataType::U8, PgWire::I16(-1)).unwrap_err();
        assert_eq!(err.code(), "decode");
    }

    #[test]
    fn mismatched_values_are_rejected_on_bind() {
        let err = PgTypes
            .bind(DataType::Boolean, &Value::from("yes"))
            .unwrap_err();
        assert_eq!(err.code(), "value_invalid");
    }

    #[test]
    fn unsigned_columns_are_one_size_up() {
        assert_eq!(PgTypes.column(DataType::U8), "SMALLINT");
        assert_eq!(PgTypes.column(DataType::U32), "BIGINT");
        assert_eq!(PgTypes.column(DataType::U64), "NUMERIC(20,0)");
    }
}
