//! Last-statement capture
//!
//! SQL adapters record every statement they run against a table so tests
//! and debugging tools can see which plan a read took.

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Default)]
pub struct Explain {
    last: Mutex<HashMap<String, String>>,
}

impl Explain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, table: &str, sql: &str) {
        trace!(table, sql, "statement");
        self.last.lock().insert(table.to_string(), sql.to_string());
    }

    /// The most recent statement run against `table`
    pub fn last(&self, table: &str) -> Option<String> {
        self.last.lock().get(table).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_latest_per_table() {
        let explain = Explain::new();
        explain.record("users", "SELECT 1");
        explain.record("users", "SELECT 2");
        explain.record("posts", "SELECT 3");
        assert_eq!(explain.last("users").as_deref(), Some("SELECT 2"));
        assert_eq!(explain.last("posts").as_deref(), Some("SELECT 3"));
        assert_eq!(explain.last("tags"), None);
    }
}
