//! Database configuration for Quarry
//!
//! A TOML file with a `[database]` table selects the engine and how to
//! reach it. String values of the form `{env:VAR}` are read from the
//! environment at load time, so secrets stay out of the file.
//!
//! ```toml
//! [database]
//! engine = "sqlite"
//! database = "data/app.db"
//! ```

pub mod database;
pub mod env;
pub mod error;

pub use database::{DatabaseConfig, ServerSettings, SqliteSettings, SurrealSettings};
pub use error::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarryConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl QuarryConfig {
    /// Read and parse the file at `path`
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), engine = config.database.engine(), "loaded config");
        Ok(config)
    }

    /// Parse TOML text, resolving env references
    ///
    /// When several variables are missing, the first is reported.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let mut value: toml::Value = toml::from_str(content)?;
        if let Err(mut errors) = env::resolve(&mut value) {
            debug!(missing = errors.len(), "unresolved env references");
            return Err(errors.remove(0));
        }
        Ok(value.try_into()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_memory() {
        let config = QuarryConfig::from_toml_str("").unwrap();
        assert_eq!(config.database, DatabaseConfig::Memory);
    }

    #[test]
    fn sqlite_defaults_to_memory() {
        let config = QuarryConfig::from_toml_str("[database]\nengine = \"sqlite\"").unwrap();
        assert_eq!(
            config.database,
            DatabaseConfig::Sqlite(SqliteSettings::default())
        );
    }

    #[test]
    fn unknown_engine_is_a_parse_error() {
        let err = QuarryConfig::from_toml_str("[database]\nengine = \"oracle\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let err = QuarryConfig::from_toml_str("[database]\nengine = \"mysql\"\nhots = \"x\"")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
