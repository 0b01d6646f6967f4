//! Fixed-width text encoding for wide integers
//!
//! Engines without a native 64/128-bit unsigned or 128-bit signed column
//! store those values as zero-padded decimal text. Every value of a
//! datatype has the same width, so text comparison, `ORDER BY` and `MAX`
//! agree with numeric order. Signed values are biased by 2^127 first.

use crate::datatype::DataType;
use crate::error::{QuarryError, Result};
use crate::value::Value;

const U64_WIDTH: usize = 20;
const U128_WIDTH: usize = 39;
const I128_BIAS: u128 = 1 << 127;

fn width(datatype: DataType) -> Option<usize> {
    match datatype {
        DataType::U64 => Some(U64_WIDTH),
        DataType::U128 | DataType::I128 => Some(U128_WIDTH),
        _ => None,
    }
}

fn decode_error(engine: &'static str, field: &str, message: impl Into<String>) -> QuarryError {
    QuarryError::Decode {
        engine,
        field: field.to_string(),
        message: message.into(),
    }
}

/// Encode a conformed u64/u128/i128 value
pub fn encode(datatype: DataType, value: &Value) -> Option<String> {
    let width = width(datatype)?;
    let magnitude = match datatype {
        DataType::I128 => {
            let i = value.as_i128()?;
            (i as u128) ^ I128_BIAS
        }
        _ => value.as_u128()?,
    };
    Some(format!("{magnitude:0width$}"))
}

/// Decode text written by [`encode`]
pub fn decode(engine: &'static str, field: &str, datatype: DataType, text: &str) -> Result<Value> {
    if width(datatype).is_none() {
        return Err(decode_error(engine, field, format!("{datatype} is not text-encoded")));
    }
    let magnitude: u128 = text
        .trim()
        .parse()
        .map_err(|_| decode_error(engine, field, format!("invalid integer text {text:?}")))?;
    let value = match datatype {
        DataType::I128 => Value::Int((magnitude ^ I128_BIAS) as i128),
        _ => Value::UInt(magnitude),
    };
    value.conform(field, datatype)
}

/// The key after `max`, or `pk_exhausted` when the datatype is full
///
/// `None` means the table is empty: the first key is 1.
pub fn next_key(store: &str, datatype: DataType, max: Option<&Value>) -> Result<Value> {
    let exhausted = || QuarryError::PkExhausted {
        store: store.to_string(),
    };
    let Some(max) = max else {
        return Value::UInt(1).conform(store, datatype);
    };
    if datatype.is_signed() {
        let next = max
            .as_i128()
            .and_then(|i| i.checked_add(1))
            .ok_or_else(exhausted)?;
        Value::Int(next.max(1))
            .conform(store, datatype)
            .map_err(|_| exhausted())
    } else {
        let next = max
            .as_u128()
            .and_then(|u| u.checked_add(1))
            .ok_or_else(exhausted)?;
        Value::UInt(next)
            .conform(store, datatype)
            .map_err(|_| exhausted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DataType::U64, Value::UInt(0))]
    #[test_case(DataType::U64, Value::UInt(u64::MAX as u128))]
    #[test_case(DataType::U128, Value::UInt(u128::MAX))]
    #[test_case(DataType::I128, Value::Int(i128::MIN))]
    #[test_case(DataType::I128, Value::Int(-1))]
    #[test_case(DataType::I128, Value::Int(0))]
    #[test_case(DataType::I128, Value::Int(i128::MAX))]
    fn round_trip(datatype: DataType, value: Value) {
        let text = encode(datatype, &value).unwrap();
        assert_eq!(decode("test", "f", datatype, &text).unwrap(), value);
    }

    #[test]
    fn text_order_matches_numeric_order() {
        let nums = [i128::MIN, -10, -9, -1, 0, 9, 10, i128::MAX];
        let texts: Vec<_> = nums
            .iter()
            .map(|n| encode(DataType::I128, &Value::Int(*n)).unwrap())
            .collect();
        let mut sorted = texts.clone();
        sorted.sort();
        assert_eq!(texts, sorted);

        let nine = encode(DataType::U64, &Value::UInt(9)).unwrap();
        let ten = encode(DataType::U64, &Value::UInt(10)).unwrap();
        assert!(nine < ten);
    }

    #[test]
    fn next_key_increments_and_detects_overflow() {
        assert_eq!(next_key("s", DataType::U64, None).unwrap(), Value::UInt(1));
        assert_eq!(
            next_key("s", DataType::U64, Some(&Value::UInt(41))).unwrap(),
            Value::UInt(42)
        );
        let full = Value::UInt(u64::MAX as u128);
        assert_eq!(
            next_key("s", DataType::U64, Some(&full)).unwrap_err().code(),
            "pk_exhausted"
        );
        assert_eq!(
            next_key("s", DataType::I64, Some(&Value::Int(-5))).unwrap(),
            Value::Int(1)
        );
    }
}
