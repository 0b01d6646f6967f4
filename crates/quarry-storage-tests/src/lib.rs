//! Shared contract tests for Quarry adapters
//!
//! The checks in [`contract`] take any `Arc<dyn Db>`; the integration test
//! runs them against every adapter compiled in. Networked engines need
//! their `QUARRY_*_URL` variable, and are skipped without it.

pub mod contract;
pub mod fixtures;

pub use fixtures::Fixture;
