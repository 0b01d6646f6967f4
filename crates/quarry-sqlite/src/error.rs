//! Error types for the SQLite adapter

use quarry_core::QuarryError;
use rusqlite::ErrorCode;
use thiserror::Error;

const ENGINE: &str = "sqlite";

/// SQLite adapter error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Blocking task failed to complete
    #[error("Task error: {0}")]
    Task(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl SqliteError {
    /// Primary key or unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Rusqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
        )
    }
}

impl From<SqliteError> for QuarryError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Connection(msg) => Self::Connection(msg),
            other => Self::backend(ENGINE, other),
        }
    }
}
