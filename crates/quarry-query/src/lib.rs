//! SQL compilation for Quarry
//!
//! Shared by the SQLite, PostgreSQL and MySQL adapters:
//!
//! - [`render`]: per-engine [`Dialect`]s
//! - [`Compiler`]: criteria, projections, sorts and relations to SQL with
//!   ordered parameters
//! - [`execute`]: joined or phased relation reads over an [`Executor`]
//! - [`keys`]: primary key assignment policy
//! - [`Explain`]: last statement per table

pub mod compile;
pub mod execute;
pub mod explain;
pub mod keys;
pub mod render;

pub use compile::Compiler;
pub use execute::{read_rows, Executor};
pub use explain::Explain;
pub use keys::KeyPlan;
pub use render::{Column, Dialect, MySql, Param, Postgres, Rendered, Sequence, Sqlite};
