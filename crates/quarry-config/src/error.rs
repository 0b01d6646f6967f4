//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A `{env:VAR}` reference named an unset variable
    #[error("Environment variable not found: {var}")]
    EnvVarNotFound { var: String },

    #[error("Invalid {field}: {message}")]
    Invalid { field: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
