//! SurrealDB adapter for Quarry
//!
//! ## Features
//!
//! - **Schemafull tables**: one typed field per store field, the primary
//!   key behind a unique index
//! - **Endpoints**: `mem://` in process, or any server `engine::any` can
//!   reach
//! - **Relations**: phased `INSIDE` lookups ranked per parent in memory
//! - **Ordering**: a per-table counter stamps each record so sort ties come
//!   back in insertion order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quarry_surrealdb::{SurrealConfig, SurrealDb};
//!
//! let db = SurrealDb::connect(&SurrealConfig::memory()).await?;
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod surql;
pub mod typemap;

pub use adapter::SurrealDb;
pub use config::SurrealConfig;
pub use error::{SurrealError, SurrealResult};
pub use typemap::SurrealTypes;
