//! Error types for the MongoDB adapter

use mongodb::error::{ErrorKind, WriteFailure};
use quarry_core::QuarryError;
use thiserror::Error;

const ENGINE: &str = "mongodb";

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_EXISTS: i32 = 48;
const NAMESPACE_NOT_FOUND: i32 = 26;

/// MongoDB adapter error type
#[derive(Error, Debug)]
pub enum MongoError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// Underlying driver error
    #[error("MongoDB error: {0}")]
    Driver(#[from] mongodb::error::Error),
}

pub type MongoResult<T> = Result<T, MongoError>;

impl MongoError {
    /// Server error code, for write and command failures
    pub fn code(&self) -> Option<i32> {
        let Self::Driver(e) = self else {
            return None;
        };
        match e.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(w)) => Some(w.code),
            ErrorKind::Command(c) => Some(c.code),
            _ => None,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        self.code() == Some(DUPLICATE_KEY)
    }

    pub fn is_namespace_exists(&self) -> bool {
        self.code() == Some(NAMESPACE_EXISTS)
    }

    pub fn is_namespace_not_found(&self) -> bool {
        self.code() == Some(NAMESPACE_NOT_FOUND)
    }
}

impl From<MongoError> for QuarryError {
    fn from(err: MongoError) -> Self {
        match err {
            MongoError::Connection(msg) => Self::Connection(msg),
            MongoError::Driver(e)
                if matches!(
                    e.kind.as_ref(),
                    ErrorKind::ServerSelection { .. }
                        | ErrorKind::Io(_)
                        | ErrorKind::DnsResolve { .. }
                ) =>
            {
                Self::Connection(e.to_string())
            }
            other => Self::backend(ENGINE, other),
        }
    }
}
