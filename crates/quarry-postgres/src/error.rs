//! Error types for the PostgreSQL adapter

use quarry_core::QuarryError;
use thiserror::Error;

const ENGINE: &str = "postgres";

/// PostgreSQL adapter error type
#[derive(Error, Debug)]
pub enum PostgresError {
    /// Server unreachable or pool exhausted
    #[error("Connection error: {0}")]
    Connection(String),

    /// Underlying sqlx error
    #[error("PostgreSQL error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result type for PostgreSQL operations
pub type PostgresResult<T> = Result<T, PostgresError>;

impl PostgresError {
    /// SQLSTATE 23505
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlx(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<PostgresError> for QuarryError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(msg) => Self::Connection(msg),
            PostgresError::Sqlx(
                e @ (sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Configuration(_)),
            ) => Self::Connection(e.to_string()),
            other => Self::backend(ENGINE, other),
        }
    }
}
