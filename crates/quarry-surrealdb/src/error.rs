//! Error types for the SurrealDB adapter

use quarry_core::QuarryError;
use thiserror::Error;

const ENGINE: &str = "surrealdb";

/// SurrealDB adapter error type
#[derive(Error, Debug)]
pub enum SurrealError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement failed on the server
    #[error("Query error: {0}")]
    Query(String),

    /// Underlying SDK error
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    /// Result did not have the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SurrealResult<T> = Result<T, SurrealError>;

impl SurrealError {
    /// Unique index violation on the primary key
    pub fn is_unique_violation(&self) -> bool {
        let message = match self {
            Self::Query(message) => message.clone(),
            Self::Surreal(e) => e.to_string(),
            _ => return false,
        };
        message.contains("already contains")
    }
}

impl From<SurrealError> for QuarryError {
    fn from(err: SurrealError) -> Self {
        match err {
            SurrealError::Connection(msg) => Self::Connection(msg),
            other => Self::backend(ENGINE, other),
        }
    }
}
