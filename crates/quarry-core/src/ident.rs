//! Identifier validation
//!
//! Table and column names are the only text ever spliced into a statement;
//! values always travel as parameters. Every adapter runs names through
//! [`validate`] before quoting them.

use crate::error::{QuarryError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub fn is_valid(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Return `name` unchanged if it is a plain identifier
pub fn validate(name: &str) -> Result<&str> {
    if is_valid(name) {
        Ok(name)
    } else {
        Err(QuarryError::IdentifierInvalid(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("users", true)]
    #[test_case("_private", true)]
    #[test_case("author_id2", true)]
    #[test_case("2fast", false)]
    #[test_case("", false)]
    #[test_case("name; DROP TABLE users", false)]
    #[test_case("a-b", false)]
    #[test_case("`quoted`", false)]
    #[test_case("naïve", false)]
    fn identifiers(name: &str, valid: bool) {
        assert_eq!(is_valid(name), valid);
        assert_eq!(validate(name).is_ok(), valid);
    }
}
