//! SQLite dialect
//!
//! - Named `$key` placeholders
//! - Wide integers live in fixed-width `TEXT`, so no casts are needed
//! - `LIKE` relies on `PRAGMA case_sensitive_like = ON`, set per connection
//! - Insertion order is the implicit `rowid`

use super::{is_auto_increment, quote_with, Dialect, Sequence};
use quarry_core::{As, DataType, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote(&self, name: &str) -> Result<String> {
        quote_with(name, '`')
    }

    fn placeholder(&self, key: &str, _index: usize, _datatype: DataType) -> String {
        format!("${key}")
    }

    fn primary_column(&self, column_type: &str, datatype: DataType) -> String {
        if is_auto_increment(datatype) {
            "INTEGER PRIMARY KEY AUTOINCREMENT".to_string()
        } else {
            format!("{column_type} PRIMARY KEY")
        }
    }

    fn sequence(&self, _target: &As) -> Sequence {
        Sequence::RowId
    }
}
