//! Scalar datatypes a schema field can declare

use crate::criteria::Operator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical datatype of a field
///
/// Engines translate these to their own column types through a
/// [`TypeMap`](crate::typemap::TypeMap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    Boolean,
    DateTime,
    Url,
    Blob,
}

impl DataType {
    pub const ALL: [DataType; 17] = [
        Self::String,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::U128,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::I128,
        Self::F32,
        Self::F64,
        Self::Boolean,
        Self::DateTime,
        Self::Url,
        Self::Blob,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Url => "url",
            Self::Blob => "blob",
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::U128
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::I128
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_unsigned() || self.is_signed()
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Integers too wide for a host double
    pub fn is_bigint(self) -> bool {
        matches!(self, Self::U64 | Self::U128 | Self::I64 | Self::I128)
    }

    /// Integers every engine can auto-increment natively
    pub fn is_small_int(self) -> bool {
        self.is_integer() && !self.is_bigint()
    }

    /// Bigints that have no native column on at least one engine and are
    /// stored as sortable text there
    pub fn is_text_bigint(self) -> bool {
        matches!(self, Self::U64 | Self::U128 | Self::I128)
    }

    /// Inclusive bounds for signed integer datatypes
    pub fn signed_range(self) -> Option<(i128, i128)> {
        match self {
            Self::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            Self::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            Self::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Self::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            Self::I128 => Some((i128::MIN, i128::MAX)),
            _ => None,
        }
    }

    /// Upper bound for unsigned integer datatypes
    pub fn unsigned_max(self) -> Option<u128> {
        match self {
            Self::U8 => Some(u8::MAX as u128),
            Self::U16 => Some(u16::MAX as u128),
            Self::U32 => Some(u32::MAX as u128),
            Self::U64 => Some(u64::MAX as u128),
            Self::U128 => Some(u128::MAX),
            _ => None,
        }
    }

    /// Whether `op` is legal on a field of this datatype
    ///
    /// String fields take pattern operators, numeric fields take
    /// comparisons and datetimes take `$before`/`$after`/`$ne`.
    pub fn accepts(self, op: Operator) -> bool {
        use Operator::*;
        match self {
            Self::String => matches!(op, Like | ILike),
            Self::DateTime => matches!(op, Before | After | Ne),
            t if t.is_numeric() => matches!(op, Gt | Gte | Lt | Lte | Ne),
            _ => false,
        }
    }

    /// Primary keys are expected to be strings or unsigned integers
    pub fn is_recommended_pk(self) -> bool {
        matches!(
            self,
            Self::String | Self::U16 | Self::U32 | Self::U64 | Self::U128
        )
    }

    /// Whether a missing key of this datatype can be generated
    pub fn is_generatable_pk(self) -> bool {
        matches!(self, Self::String) || self.is_integer()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown datatype {s}"))
    }
}
