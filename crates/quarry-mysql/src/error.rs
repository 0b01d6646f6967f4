//! Error types for the MySQL adapter

use quarry_core::QuarryError;
use thiserror::Error;

const ENGINE: &str = "mysql";

/// MySQL adapter error type
#[derive(Error, Debug)]
pub enum MySqlError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// Underlying sqlx error
    #[error("MySQL error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type MySqlResult<T> = Result<T, MySqlError>;

impl MySqlError {
    /// Error 1062, duplicate entry
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlx(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<MySqlError> for QuarryError {
    fn from(err: MySqlError) -> Self {
        match err {
            MySqlError::Connection(msg) => Self::Connection(msg),
            MySqlError::Sqlx(
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
