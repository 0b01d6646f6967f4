//! PostgreSQL dialect
//!
//! Wide integers are `NUMERIC` columns. They travel as text, so parameters
//! are cast with `::numeric` and columns are read back with `::text`.

use super::{is_auto_increment, quote_with, Dialect, Sequence};
use quarry_core::{As, DataType, Direction, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote(&self, name: &str) -> Result<String> {
        quote_with(name, '"')
    }

    fn placeholder(&self, _key: &str, index: usize, datatype: DataType) -> String {
        if datatype.is_text_bigint() {
            format!("${index}::numeric")
        } else {
            format!("${index}")
        }
    }

    fn read_column(&self, column: &str, datatype: DataType) -> String {
        if datatype.is_text_bigint() {
            format!("{column}::text")
        } else {
            column.to_string()
        }
    }

    // Backslash is not an escape anywhere else
    fn like(&self, column: &str, pattern: &str) -> String {
        format!("{column} LIKE {pattern} ESCAPE ''")
    }

    fn ilike(&self, column: &str, pattern: &str) -> String {
        format!("{column} ILIKE {pattern} ESCAPE ''")
    }

    fn order(&self, column: &str, datatype: DataType, direction: Direction) -> String {
        // Expressions, not bare names, so output casts never shadow them
        let expr = match datatype {
            t if t.is_text_bigint() => format!("{column}::numeric"),
            DataType::String | DataType::Url => format!("{column} COLLATE \"C\""),
            _ => column.to_string(),
        };
        let nulls = match direction {
            Direction::Asc => "NULLS FIRST",
            Direction::Desc => "NULLS LAST",
        };
        format!("{expr} {} {nulls}", direction.as_sql())
    }

    fn primary_column(&self, column_type: &str, datatype: DataType) -> String {
        if !is_auto_increment(datatype) {
            return format!("{column_type} PRIMARY KEY");
        }
        let serial = match datatype {
            DataType::U8 | DataType::I8 | DataType::I16 => "SMALLSERIAL",
            DataType::U16 | DataType::I32 => "SERIAL",
            _ => "BIGSERIAL",
        };
        format!("{serial} PRIMARY KEY")
    }

    fn sequence(&self, _target: &As) -> Sequence {
        Sequence::Hidden("BIGSERIAL")
    }

    fn returning(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_integers_are_cast() {
        assert_eq!(Postgres.placeholder("id", 3, DataType::U128), "$3::numeric");
        assert_eq!(Postgres.placeholder("id", 1, DataType::I64), "$1");
        assert_eq!(Postgres.read_column("\"id\"", DataType::U64), "\"id\"::text");
    }

    #[test]
    fn nulls_sort_like_the_other_engines() {
        assert_eq!(
            Postgres.order("\"age\"", DataType::U8, Direction::Desc),
            "\"age\" DESC NULLS LAST"
        );
        assert_eq!(
            Postgres.order("\"name\"", DataType::String, Direction::Asc),
            "\"name\" COLLATE \"C\" ASC NULLS FIRST"
        );
    }

    #[test]
    fn serial_keys() {
        assert_eq!(Postgres.primary_column("INTEGER", DataType::U16), "SERIAL PRIMARY KEY");
        assert_eq!(Postgres.primary_column("BIGINT", DataType::U32), "BIGSERIAL PRIMARY KEY");
        assert_eq!(
            Postgres.primary_column("NUMERIC(20,0)", DataType::U64),
            "NUMERIC(20,0) PRIMARY KEY"
        );
    }
}
