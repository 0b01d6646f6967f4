//! Quarry core: one typed query vocabulary over many storage engines
//!
//! This crate holds everything that is engine-independent:
//!
//! ## Features
//!
//! - **Data model**: [`DataType`], [`Value`] and [`Record`], with relations
//!   attached to records as [`Related`] values
//! - **Criteria**: a closed [`Operator`] set, [`Criteria`], [`Sort`] and
//!   [`Changeset`]
//! - **Schemas**: [`Schema`] built and validated once, relation definitions
//!   resolved by name through a [`Catalog`]
//! - **Adapters**: the [`Db`] trait every engine implements, plus
//!   [`MemoryDb`], the reference engine
//! - **Relation planning**: joined vs phased loading in [`relation`]
//! - **Store**: the validating facade in [`store`]
//!
//! ## Usage
//!
//! ```no_run
//! use quarry_core::{record, Catalog, Criteria, DataType, FindOptions, MemoryDb, Schema};
//! use std::sync::Arc;
//!
//! # async fn demo() -> quarry_core::Result<()> {
//! let users = Schema::builder()
//!     .primary("id", DataType::String)
//!     .field("name", DataType::String)
//!     .optional("age", DataType::U8)
//!     .build("users")?;
//!
//! let catalog = Catalog::with_db(Arc::new(MemoryDb::new()));
//! let store = catalog.store("users", users)?;
//! store.create_schema().await?;
//! store.insert(record! { "name" => "Donald", "age" => 30u8 }).await?;
//!
//! let rows = store
//!     .find(FindOptions::new().filter(Criteria::new().eq("name", "Donald")))
//!     .await?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod criteria;
pub mod datatype;
pub mod db;
pub mod error;
pub mod ident;
pub mod memory;
pub mod relation;
pub mod schema;
pub mod sortable;
pub mod store;
pub mod typemap;
pub mod value;

pub use criteria::{bind_key, Changeset, Condition, Criteria, Direction, Operator, Sort};
pub use datatype::DataType;
pub use db::{As, Db, ReadArgs, ReadMode, ReadResult};
pub use error::{FieldContext, QuarryError, RelationSide, Result};
pub use memory::MemoryDb;
pub use relation::{Relation, With};
pub use schema::{Field, Kind, RelationDef, Schema, SchemaBuilder};
pub use store::{Catalog, FindOptions, GetOptions, RelationOptions, Store};
pub use typemap::TypeMap;
pub use value::{Record, Related, Value};
