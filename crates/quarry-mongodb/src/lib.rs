//! MongoDB adapter for Quarry
//!
//! ## Features
//!
//! - **Documents**: one collection per store, the primary key in `_id`
//! - **Typemap**: wide integers as fixed-width sortable strings, so range
//!   filters and sorts agree with numeric order
//! - **Relations**: phased `$in` lookups ranked per parent in memory
//! - **Ordering**: a hidden object id field breaks sort ties in insertion
//!   order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quarry_mongodb::{MongoConfig, MongoDb};
//!
//! let db = MongoDb::connect(&MongoConfig::new("mongodb://localhost:27017", "app")).await?;
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod query;
pub mod typemap;

pub use adapter::MongoDb;
pub use config::MongoConfig;
pub use error::{MongoError, MongoResult};
pub use typemap::MongoTypes;
