//! MySQL datatype mapping
//!
//! Integers up to 64 bits use native columns with the matching signedness.
//! The 128-bit integers are `DECIMAL(39,0)` and travel as decimal text.
//! Datetimes are `DATETIME(3)` holding UTC. Text columns use `utf8mb4_bin`
//! so comparisons and `LIKE` are case-sensitive.

use chrono::{NaiveDateTime, TimeZone, Utc};
use quarry_core::{DataType, Result, TypeMap, Value};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::Row;
use url::Url;

const ENGINE: &str = "mysql";

/// A value as sent to or read from MySQL
#[derive(Debug, Clone, PartialEq)]
pub enum MyWire {
    Null,
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
}

impl MyWire {
    pub fn bind_to<'q>(
        self,
        query: Query<'q, sqlx::MySql, MySqlArguments>,
    ) -> Query<'q, sqlx::MySql, MySqlArguments> {
        match self {
            Self::Null => query.bind(None::<String>),
            Self::Int(v) => query.bind(v),
            Self::UInt(v) => query.bind(v),
            Self::F32(v) => query.bind(v),
            Self::F64(v) => query.bind(v),
            Self::Bool(v) => query.bind(v),
            Self::Text(v) => query.bind(v),
            Self::Bytes(v) => query.bind(v),
            Self::DateTime(v) => query.bind(v),
        }
    }
}

/// Read column `$index` as `Option<$t>` and wrap it in a wire variant
macro_rules! read {
    ($row:expr, $index:expr, $t:ty, $wire:expr) => {
        $row.try_get::<Option<$t>, _>($index)
            .map(|v| v.map_or(MyWire::Null, $wire))
    };
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTypes;

impl MySqlTypes {
    /// Read column `index` of `row` as `datatype`
    pub fn read(&self, row: &MySqlRow, index: usize, datatype: DataType) -> Result<Value> {
        let decoded = match datatype {
            DataType::U8 => read!(row, index, u8, |v| MyWire::UInt(u64::from(v))),
            DataType::U16 => read!(row, index, u16, |v| MyWire::UInt(u64::from(v))),
            DataType::U32 => read!(row, index, u32, |v| MyWire::UInt(u64::from(v))),
            DataType::U64 => read!(row, index, u64, MyWire::UInt),
            DataType::I8 => read!(row, index, i8, |v| MyWire::Int(i64::from(v))),
            DataType::I16 => read!(row, index, i16, |v| MyWire::Int(i64::from(v))),
            DataType::I32 => read!(row, index, i32, |v| MyWire::Int(i64::from(v))),
            DataType::I64 => read!(row, index, i64, MyWire::Int),
            DataType::F32 => read!(row, index, f32, MyWire::F32),
            DataType::F64 => read!(row, index, f64, MyWire::F64),
            DataType::Boolean => read!(row, index, bool, MyWire::Bool),
            DataType::DateTime => read!(row, index, NaiveDateTime, MyWire::DateTime),
            DataType::Blob => read!(row, index, Vec<u8>, MyWire::Bytes),
            // Decimals are read through `CAST(... AS CHAR)`
            DataType::U128 | DataType::I128 | DataType::String | DataType::Url => {
                read!(row, index, String, MyWire::Text)
            }
        };
        let wire = decoded.map_err(|e| self.undecodable(datatype, e.to_string()))?;
        self.unbind(datatype, wire)
    }
}

impl TypeMap for MySqlTypes {
    type Wire = MyWire;

    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn column(&self, datatype: DataType) -> &'static str {
        match datatype {
            DataType::U8 => "TINYINT UNSIGNED",
            DataType::U16 => "SMALLINT UNSIGNED",
            DataType::U32 => "INT UNSIGNED",
            DataType::U64 => "BIGINT UNSIGNED",
            DataType::I8 => "TINYINT",
            DataType::I16 => "SMALLINT",
            DataType::I32 => "INT",
            DataType::I64 => "BIGINT",
            DataType::U128 | DataType::I128 => "DECIMAL(39,0)",
            DataType::F32 => "FLOAT",
            DataType::F64 => "DOUBLE",
            DataType::Boolean => "BOOLEAN",
            DataType::DateTime => "DATETIME(3)",
            DataType::Blob => "LONGBLOB",
            DataType::String | DataType::Url => "TEXT CHARACTER SET utf8mb4 COLLATE utf8mb4_bin",
        }
    }

    fn bind(&self, datatype: DataType, value: &Value) -> Result<MyWire> {
        if value.is_null() {
            return Ok(MyWire::Null);
        }
        let wire = match datatype {
            DataType::U128 => value.as_u128().map(|u| MyWire::Text(u.to_string())),
            DataType::I128 => value.as_i128().map(|i| MyWire::Text(i.to_string())),
            t if t.is_unsigned() => value
                .as_u128()
                .and_then(|u| u64::try_from(u).ok())
                .map(MyWire::UInt),
            t if t.is_signed() => value
                .as_i128()
                .and_then(|i| i64::try_from(i).ok())
                .map(MyWire::Int),
            DataType::F32 => value.as_f64().map(|f| MyWire::F32(f as f32)),
            DataType::F64 => value.as_f64().map(MyWire::F64),
            DataType::Boolean => match value {
                Value::Bool(b) => Some(MyWire::Bool(*b)),
                _ => None,
            },
            DataType::DateTime => match value {
                Value::DateTime(dt) => Some(MyWire::DateTime(dt.naive_utc())),
                _ => None,
            },
            DataType::Url => match value {
                Value::Url(url) => Some(MyWire::Text(url.to_string())),
                _ => None,
            },
            DataType::Blob => match value {
                Value::Blob(bytes) => Some(MyWire::Bytes(bytes.clone())),
                _ => None,
            },
            _ => value.as_str().map(|s| MyWire::Text(s.to_string())),
        };
        wire.ok_or_else(|| self.unsupported(datatype, value))
    }

    fn unbind(&self, datatype: DataType, wire: MyWire) -> Result<Value> {
        let value = match (datatype, wire) {
            (_, MyWire::Null) => return Ok(Value::Null),
            (DataType::U128, MyWire::Text(text)) => text
                .parse::<u128>()
                .map(Value::UInt)
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (DataType::I128, MyWire::Text(text)) => text
                .parse::<i128>()
                .map(Value::Int)
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (_, MyWire::UInt(u)) => Value::UInt(u128::from(u)),
            (_, MyWire::Int(i)) => Value::Int(i128::from(i)),
            (DataType::F32, MyWire::F32(f)) => Value::Float(f64::from(f)),
            (DataType::F64, MyWire::F64(f)) => Value::Float(f),
            (DataType::Boolean, MyWire::Bool(b)) => Value::Bool(b),
            (DataType::DateTime, MyWire::DateTime(dt)) => {
                Value::DateTime(Utc.from_utc_datetime(&dt))
            }
            (DataType::Url, MyWire::Text(text)) => Url::parse(&text)
                .map(Value::Url)
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (DataType::String, MyWire::Text(text)) => Value::String(text),
            (DataType::Blob, MyWire::Bytes(bytes)) => Value::Blob(bytes),
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
    use test_case::test_case;

    #[test_case(DataType::U8, Value::UInt(255), MyWire::UInt(255))]
    #[test_case(DataType::U64, Value::UInt(u64::MAX as u128), MyWire::UInt(u64::MAX))]
    #[test_case(DataType::I8, Value::Int(-128), MyWire::Int(-128))]
    #[test_case(DataType::I64, Value::Int(i64::MAX as i128), MyWire::Int(i64::MAX))]
    #[test_case(DataType::U128, Value::UInt(u128::MAX), MyWire::Text(u128::MAX.to_string()))]
    #[test_case(DataType::I128, Value::Int(-5), MyWire::Text("-5".into()))]
    #[test_case(DataType::Boolean, Value::Bool(true), MyWire::Bool(true))]
    #[test_case(DataType::String, Value::from("Ünïcode"), MyWire::Text("Ünïcode".into()))]
    fn round_trips(datatype: DataType, value: Value, expected: MyWire) {
        let wire = MySqlTypes.bind(datatype, &value).unwrap();
        assert_eq!(wire, expected);
        assert_eq!(MySqlTypes.unbind(datatype, wire).unwrap(), value);
    }

    #[test]
    fn datetimes_are_stored_as_utc() {
        let dt = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let wire = MySqlTypes.bind(DataType::DateTime, &Value::DateTime(dt)).unwrap();
        assert_eq!(wire, MyWire::DateTime(dt.naive_utc()));
        assert_eq!(
            MySqlTypes.unbind(DataType::DateTime, wire).unwrap(),
            Value::DateTime(dt)
        );
    }

    #[test]
    fn overflowing_decimals_fail_to_decode() {
        let err = MySqlTypes
            .unbind(DataType::I128, MyWire::Text("9".repeat(40)))
            .unwrap_err();
        assert_eq!(err.code(), "decode");
    }

    #[test]
    fn string_columns_compare_bytewise() {
        assert!(MySqlTypes.column(DataType::String).ends_with("utf8mb4_bin"));
    }
}
