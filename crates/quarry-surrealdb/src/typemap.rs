//! SurrealDB datatype mapping
//!
//! Values travel as JSON. Results come back as serialized
//! `surrealdb::Value`s, tagged per variant (`{"Strand": "x"}`,
//! `{"Number": {"Int": 1}}`); [`plain`] strips the tags first.
//!
//! | datatype | field type | wire |
//! |---|---|---|
//! | u8..u32, i8..i64 | int | number |
//! | u64, u128, i128 | string | fixed-width sortable text |
//! | f32, f64 | float | number |
//! | boolean | bool | bool |
//! | datetime | datetime | RFC 3339 text, cast with `<datetime>` |
//! | string, url | string | string |
//! | blob | string | base64 |

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use quarry_core::{sortable, DataType, Result, TypeMap, Value};
use serde_json::{Map, Number, Value as Json};
use url::Url;

const ENGINE: &str = "surrealdb";

/// Strip SDK variant tags from a serialized `surrealdb::Value`
pub fn plain(value: Json) -> Json {
    match value {
        Json::String(tag) if tag == "None" || tag == "Null" => Json::Null,
        Json::Object(map) if map.len() == 1 => {
            let Some((tag, inner)) = map.into_iter().next() else {
                return Json::Null;
            };
            match (tag.as_str(), inner) {
                ("Number", Json::Object(number)) => number
                    .into_iter()
                    .next()
                    .map_or(Json::Null, |(kind, n)| match (kind.as_str(), n) {
                        ("Decimal", Json::String(s)) => {
                            s.parse().map_or(Json::String(s), Json::Number)
                        }
                        (_, n) => n,
                    }),
                ("Array", Json::Array(items)) => {
                    Json::Array(items.into_iter().map(plain).collect())
                }
                ("Object", Json::Object(fields)) => Json::Object(
                    fields.into_iter().map(|(k, v)| (k, plain(v))).collect(),
                ),
                ("Strand" | "Datetime" | "Bool" | "Uuid" | "Duration", inner) => inner,
                (tag, inner) => {
                    let mut map = Map::new();
                    map.insert(tag.to_string(), inner);
                    Json::Object(map)
                }
            }
        }
        other => other,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SurrealTypes;

impl TypeMap for SurrealTypes {
    type Wire = Json;

    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn column(&self, datatype: DataType) -> &'static str {
        match datatype {
            t if t.is_text_bigint() => "string",
            t if t.is_integer() => "int",
            DataType::F32 | DataType::F64 => "float",
            DataType::Boolean => "bool",
            DataType::DateTime => "datetime",
            _ => "string",
        }
    }

    fn bind(&self, datatype: DataType, value: &Value) -> Result<Json> {
        if value.is_null() {
            return Ok(Json::Null);
        }
        let wire = match datatype {
            t if t.is_text_bigint() => sortable::encode(t, value).map(Json::String),
            t if t.is_integer() => value
                .as_i128()
                .and_then(|i| i64::try_from(i).ok())
                .map(|i| Json::Number(i.into())),
            DataType::F32 | DataType::F64 => {
                value.as_f64().and_then(Number::from_f64).map(Json::Number)
            }
            DataType::Boolean => match value {
                Value::Bool(b) => Some(Json::Bool(*b)),
                _ => None,
            },
            DataType::DateTime => match value {
                Value::DateTime(dt) => {
                    Some(Json::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
                }
                _ => None,
            },
            DataType::Url => match value {
                Value::Url(url) => Some(Json::String(url.to_string())),
                _ => None,
            },
            DataType::Blob => match value {
                Value::Blob(bytes) => Some(Json::String(BASE64.encode(bytes))),
                _ => None,
            },
            _ => value.as_str().map(|s| Json::String(s.to_string())),
        };
        wire.ok_or_else(|| self.unsupported(datatype, value))
    }

    fn unbind(&self, datatype: DataType, wire: Json) -> Result<Value> {
        let value = match (datatype, wire) {
            (_, Json::Null) => return Ok(Value::Null),
            (t, Json::String(text)) if t.is_text_bigint() => {
                return sortable::decode(ENGINE, t.name(), t, &text);
            }
            (t, Json::Number(n)) if t.is_integer() => n
                .as_i64()
                .map(|i| Value::Int(i128::from(i)))
                .ok_or_else(|| self.undecodable(datatype, format!("not an integer: {n}")))?,
            (DataType::F32 | DataType::F64, Json::Number(n)) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| self.undecodable(datatype, format!("not a float: {n}")))?,
            (DataType::Boolean, Json::Bool(b)) => Value::Bool(b),
            (DataType::DateTime, Json::String(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (DataType::Url, Json::String(text)) => Url::parse(&text)
                .map(Value::Url)
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (DataType::String, Json::String(text)) => Value::String(text),
            (DataType::Blob, Json::String(text)) => BASE64
                .decode(text)
                .map(Value::Blob)
                .map_err(|e| self.undecodable(datatype, e.to_string()))?,
            (_, other) => return Err(self.undecodable(datatype, format!("unexpected {other}"))),
        };
        value
            .conform(datatype.name(), datatype)
            .map_err(|e| self.undecodable(datatype, e.to_string()))
    }
}
