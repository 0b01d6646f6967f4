//! SQL dialects
//!
//! A [`Dialect`] supplies the few fragments that differ between engines:
//! identifier quoting, placeholders, wide-integer casts, pattern matching
//! and null ordering. Everything else is assembled by the
//! [`Compiler`](crate::Compiler).

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use quarry_core::{ident, As, DataType, Direction, Result, Value};

/// Hidden insertion-order column on engines without a usable row id
pub const SEQ: &str = "__seq";

/// A bound parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name; the placeholder text for named dialects
    pub key: String,
    pub datatype: DataType,
    pub value: Value,
}

/// An output column and the datatype it decodes as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
}

/// A compiled statement
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    /// Parameters in placeholder order
    pub params: Vec<Param>,
    /// Output columns, by position
    pub columns: Vec<Column>,
}

/// Where a table's insertion order comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    /// The engine's implicit row id
    RowId,
    /// A hidden auto-incrementing [`SEQ`] column with this definition
    Hidden(&'static str),
    /// The auto-incrementing primary key
    Primary,
}

/// Quote `name` with `quote` after validating it as an identifier
pub fn quote_with(name: &str, quote: char) -> Result<String> {
    let name = ident::validate(name)?;
    Ok(format!("{quote}{name}{quote}"))
}

/// Whether the engine assigns `datatype` primary keys itself
pub fn is_auto_increment(datatype: DataType) -> bool {
    datatype.is_small_int()
}

pub trait Dialect: Send + Sync {
    /// Engine name, for logs and errors
    fn name(&self) -> &'static str;

    /// Validate and quote an identifier
    fn quote(&self, name: &str) -> Result<String>;

    /// Placeholder text for the `index`th (1-based) parameter
    fn placeholder(&self, key: &str, index: usize, datatype: DataType) -> String;

    /// Expression reading `column` in its wire form
    fn read_column(&self, column: &str, _datatype: DataType) -> String {
        column.to_string()
    }

    /// Case-sensitive match; `%` and `_` are the only wildcards
    fn like(&self, column: &str, pattern: &str) -> String {
        format!("{column} LIKE {pattern}")
    }

    /// Case-insensitive match
    fn ilike(&self, column: &str, pattern: &str) -> String {
        format!("LOWER({column}) LIKE LOWER({pattern})")
    }

    /// One `ORDER BY` term; nulls sort before values ascending
    fn order(&self, column: &str, _datatype: DataType, direction: Direction) -> String {
        format!("{column} {}", direction.as_sql())
    }

    /// Column definition of the primary key, after its name
    fn primary_column(&self, column_type: &str, datatype: DataType) -> String;

    fn sequence(&self, target: &As) -> Sequence;

    /// `INSERT` tail when no column is given
    fn default_values(&self) -> &'static str {
        "DEFAULT VALUES"
    }

    /// Whether `INSERT ... RETURNING` reports generated keys
    fn returning(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&Sqlite, "`users`")]
    #[test_case(&MySql, "`users`")]
    #[test_case(&Postgres, "\"users\"")]
    fn quotes_identifiers(dialect: &dyn Dialect, expected: &str) {
        assert_eq!(dialect.quote("users").unwrap(), expected);
    }

    #[test_case(&Sqlite)]
    #[test_case(&MySql)]
    #[test_case(&Postgres)]
    fn rejects_injection(dialect: &dyn Dialect) {
        let err = dialect.quote("users`; DROP TABLE users; --").unwrap_err();
        assert_eq!(err.code(), "identifier_invalid");
    }

    #[test]
    fn small_ints_auto_increment() {
        assert!(is_auto_increment(DataType::U32));
        assert!(is_auto_increment(DataType::I8));
        assert!(!is_auto_increment(DataType::U64));
        assert!(!is_auto_increment(DataType::String));
    }
}
