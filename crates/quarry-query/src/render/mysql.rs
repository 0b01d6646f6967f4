//! MySQL dialect
//!
//! Positional `?` placeholders. `u64` is a native `BIGINT UNSIGNED`; the
//! 128-bit integers are `DECIMAL(39,0)`, bound as text and read back with
//! `CAST(... AS CHAR)`. String columns use a binary collation, which makes
//! `LIKE` case-sensitive.

use super::{is_auto_increment, quote_with, Dialect, Sequence};
use quarry_core::{As, DataType, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

fn is_decimal(datatype: DataType) -> bool {
    matches!(datatype, DataType::U128 | DataType::I128)
}

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote(&self, name: &str) -> Result<String> {
        quote_with(name, '`')
    }

    fn placeholder(&self, _key: &str, _index: usize, datatype: DataType) -> String {
        if is_decimal(datatype) {
            "CAST(? AS DECIMAL(65,0))".to_string()
        } else {
            "?".to_string()
        }
    }

    fn read_column(&self, column: &str, datatype: DataType) -> String {
        if is_decimal(datatype) {
            format!("CAST({column} AS CHAR)")
        } else {
            column.to_string()
        }
    }

    fn like(&self, column: &str, pattern: &str) -> String {
        format!("{column} LIKE {pattern} ESCAPE ''")
    }

    fn ilike(&self, column: &str, pattern: &str) -> String {
        format!("LOWER({column}) LIKE LOWER({pattern}) ESCAPE ''")
    }

    fn primary_column(&self, column_type: &str, datatype: DataType) -> String {
        match datatype {
            t if is_auto_increment(t) => {
                format!("{column_type} NOT NULL AUTO_INCREMENT PRIMARY KEY")
            }
            // TEXT cannot be a key without a prefix length
            DataType::String | DataType::Url => {
                "VARCHAR(191) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin PRIMARY KEY".to_string()
            }
            _ => format!("{column_type} PRIMARY KEY"),
        }
    }

    fn sequence(&self, target: &As) -> Sequence {
        // One AUTO_INCREMENT column per table
        match target.pk_type() {
            Some(t) if is_auto_increment(t) => Sequence::Primary,
            _ => Sequence::Hidden("BIGINT UNSIGNED NOT NULL AUTO_INCREMENT UNIQUE"),
        }
    }

    fn default_values(&self) -> &'static str {
        "() VALUES ()"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Schema;

    #[test]
    fn only_128_bit_integers_are_decimal() {
        assert_eq!(MySql.placeholder("id", 1, DataType::U64), "?");
        assert_eq!(MySql.placeholder("id", 1, DataType::I128), "CAST(? AS DECIMAL(65,0))");
        assert_eq!(MySql.read_column("`id`", DataType::U128), "CAST(`id` AS CHAR)");
    }

    #[test]
    fn auto_increment_key_doubles_as_sequence() {
        let schema = Schema::builder()
            .primary("id", DataType::U32)
            .build("posts")
            .unwrap();
        assert_eq!(MySql.sequence(&As::new("posts", &schema, true)), Sequence::Primary);

        let schema = Schema::builder()
            .primary("id", DataType::String)
            .build("users")
            .unwrap();
        assert!(matches!(
            MySql.sequence(&As::new("users", &schema, true)),
            Sequence::Hidden(_)
        ));
    }
}
