//! MySQL adapter for Quarry
//!
//! ## Features
//!
//! - **Typemap**: native signed and unsigned integers up to 64 bits,
//!   `DECIMAL(39,0)` for the 128-bit ones
//! - **Text**: binary collation, so sorting and `LIKE` match the other
//!   engines
//! - **Keys**: `AUTO_INCREMENT` small integer keys read back with
//!   `LAST_INSERT_ID()`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quarry_mysql::{MySqlConfig, MySqlDb};
//!
//! let db = MySqlDb::connect(&MySqlConfig::new("mysql://root@localhost/app")).await?;
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod typemap;

pub use adapter::MySqlDb;
pub use config::MySqlConfig;
pub use error::{MySqlError, MySqlResult};
pub use typemap::{MyWire, MySqlTypes};
