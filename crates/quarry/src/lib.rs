//! Quarry: typed records over many storage engines
//!
//! Declare a [`Schema`], register it in a [`Catalog`] bound to a database,
//! and query through the returned [`Store`]. The same criteria, sorts and
//! relation options work on every engine.
//!
//! ## Engines
//!
//! | engine | feature |
//! |---|---|
//! | in-memory | always |
//! | SQLite | `sqlite` (default) |
//! | PostgreSQL | `postgres` |
//! | MySQL | `mysql` |
//! | MongoDB | `mongodb` |
//! | SurrealDB | `surrealdb` |
//!
//! ## Usage
//!
//! ```no_run
//! use quarry::{connect, record, Catalog, DataType, DatabaseConfig, Schema};
//!
//! # async fn demo() -> quarry::Result<()> {
//! let db = connect(&DatabaseConfig::default()).await?;
//! let catalog = Catalog::with_db(db);
//! let users = Schema::builder()
//!     .primary("id", DataType::U32)
//!     .field("name", DataType::String)
//!     .build("users")?;
//! let users = catalog.store("users", users)?;
//! users.create_schema().await?;
//! users.insert(record! { "name" => "Ada" }).await?;
//! # Ok(())
//! # }
//! ```

pub mod connect;

pub use connect::{connect, connect_file};
pub use quarry_config::{ConfigError, DatabaseConfig, QuarryConfig};
pub use quarry_core::*;

#[cfg(feature = "sqlite")]
pub use quarry_sqlite as sqlite;

#[cfg(feature = "postgres")]
pub use quarry_postgres as postgres;

#[cfg(feature = "mysql")]
pub use quarry_mysql as mysql;

#[cfg(feature = "mongodb")]
pub use quarry_mongodb as mongodb;

#[cfg(feature = "surrealdb")]
pub use quarry_surrealdb as surrealdb;
