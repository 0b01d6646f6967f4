//! Per-engine datatype translation
//!
//! Each adapter owns one [`TypeMap`]: the engine column type for every
//! [`DataType`], plus `bind`/`unbind` between [`Value`] and the driver's
//! wire representation. For every value `x` that conforms to a datatype,
//! `unbind(t, bind(t, x)) == x`.

use crate::datatype::DataType;
use crate::error::{QuarryError, Result};
use crate::value::Value;

pub trait TypeMap: Send + Sync {
    /// Driver-side value
    type Wire;

    /// Engine name, for errors
    fn engine(&self) -> &'static str;

    /// Column type used in schema definitions
    fn column(&self, datatype: DataType) -> &'static str;

    fn bind(&self, datatype: DataType, value: &Value) -> Result<Self::Wire>;

    fn unbind(&self, datatype: DataType, wire: Self::Wire) -> Result<Value>;

    /// Error for a value the typemap cannot carry
    fn unsupported(&self, datatype: DataType, value: &Value) -> QuarryError {
        QuarryError::ValueInvalid {
            field: self.engine().to_string(),
            datatype: datatype.name().to_string(),
            got: value.kind().to_string(),
        }
    }

    /// Error for a wire value that does not decode as `datatype`
    fn undecodable(&self, datatype: DataType, message: impl Into<String>) -> QuarryError {
        QuarryError::Decode {
            engine: self.engine(),
            field: datatype.name().to_string(),
            message: message.into(),
        }
    }
}
