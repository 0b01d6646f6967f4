//! PostgreSQL adapter for Quarry
//!
//! ## Features
//!
//! - **Typemap**: unsigned integers one size up, `u64` and the 128-bit
//!   integers as `NUMERIC` travelling as text
//! - **Keys**: small integer keys are `SERIAL` columns read back through
//!   `RETURNING`
//! - **Ordering**: a hidden `BIGSERIAL` column breaks sort ties in
//!   insertion order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quarry_core::Catalog;
//! use quarry_postgres::{PostgresConfig, PostgresDb};
//! use std::sync::Arc;
//!
//! let db = PostgresDb::connect(&PostgresConfig::new("postgres://localhost/app")).await?;
//! let catalog = Catalog::with_db(Arc::new(db));
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod typemap;

pub use adapter::PostgresDb;
pub use config::PostgresConfig;
pub use error::{PostgresError, PostgresResult};
pub use typemap::{PgTypes, PgWire};
