//! SQLite adapter for Quarry
//!
//! ## Features
//!
//! - **Typemap**: wide integers as fixed-width sortable text, datetimes as
//!   millisecond RFC 3339 text
//! - **Relations**: joined or phased reads through `quarry-query`
//! - **Thread Safety**: Arc<Mutex<Connection>>, driven from
//!   `spawn_blocking`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quarry_core::Catalog;
//! use quarry_sqlite::{SqliteConfig, SqliteDb};
//! use std::sync::Arc;
//!
//! let db = SqliteDb::open(SqliteConfig::new("./quarry.db"))?;
//! let catalog = Catalog::with_db(Arc::new(db));
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
pub mod error;
pub mod typemap;

pub use adapter::SqliteDb;
pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use error::{SqliteError, SqliteResult};
pub use typemap::SqliteTypes;
