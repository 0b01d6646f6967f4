//! The database adapter trait
//!
//! Every engine implements [`Db`] independently. The Store validates all
//! input before calling an adapter, so adapters may assume that every field
//! they receive exists in [`As::types`] and every value conforms to its
//! datatype. Adapters still quote identifiers through [`crate::ident`].

use crate::criteria::{Changeset, Criteria, Sort};
use crate::datatype::DataType;
use crate::error::{QuarryError, Result};
use crate::relation::With;
use crate::schema::Schema;
use crate::value::Record;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;

/// Query context for one adapter call
///
/// Recomputed from the Store's schema on every operation; never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct As {
    pub name: String,
    pub pk: Option<String>,
    pub types: IndexMap<String, DataType>,
    pub generate_pk: bool,
}

impl As {
    pub fn new(name: impl Into<String>, schema: &Schema, generate_pk: bool) -> Self {
        Self {
            name: name.into(),
            pk: schema.pk().map(str::to_string),
            types: schema.types(),
            generate_pk,
        }
    }

    pub fn datatype(&self, field: &str) -> Option<DataType> {
        self.types.get(field).copied()
    }

    pub fn pk_type(&self) -> Option<DataType> {
        self.pk.as_deref().and_then(|pk| self.datatype(pk))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    /// `fields`, or every declared field when `None`
    pub fn resolve_fields(&self, fields: Option<&[String]>) -> Vec<String> {
        fields.map_or_else(|| self.field_names(), <[String]>::to_vec)
    }
}

/// Arguments of a row-returning read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadArgs {
    pub criteria: Criteria,
    /// Projection; `None` reads every field
    pub fields: Option<Vec<String>>,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
    /// Relations to load onto each row
    pub with: With,
}

impl ReadArgs {
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            ..Self::default()
        }
    }
}

/// What a read should return
#[derive(Debug, Clone, PartialEq)]
pub enum ReadMode {
    Count(Criteria),
    Rows(ReadArgs),
}

/// Result of [`Db::read`], matching the [`ReadMode`] it was asked for
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    Count(u64),
    Rows(Vec<Record>),
}

impl ReadResult {
    pub fn into_count(self) -> Result<u64> {
        match self {
            Self::Count(n) => Ok(n),
            Self::Rows(_) => Err(mismatch("count")),
        }
    }

    pub fn into_rows(self) -> Result<Vec<Record>> {
        match self {
            Self::Rows(rows) => Ok(rows),
            Self::Count(_) => Err(mismatch("rows")),
        }
    }
}

fn mismatch(expected: &str) -> QuarryError {
    QuarryError::Decode {
        engine: "adapter",
        field: "read".to_string(),
        message: format!("expected {expected} result"),
    }
}

/// A storage engine adapter
///
/// ## Contract
///
/// - `create_schema` and `delete_schema` are idempotent.
/// - `create` assigns a primary key when the record lacks one and
///   `As::generate_pk` is set, and fails with `pk_duplicate` when the key
///   already exists.
/// - `read` honours criteria, projection, sort, limit and relations; rows
///   tied on every sort key come back in insertion order.
/// - `update` sets present values and unsets `Null` values, returning the
///   number of matched rows.
/// - Null and absent fields are the same thing: unbinding drops nulls.
#[async_trait]
pub trait Db: Send + Sync {
    /// Engine name used in logs and errors
    fn engine(&self) -> &'static str;

    async fn create_schema(&self, target: &As) -> Result<()>;

    async fn delete_schema(&self, name: &str) -> Result<()>;

    async fn create(&self, target: &As, record: Record) -> Result<Record>;

    async fn read(&self, target: &As, mode: ReadMode) -> Result<ReadResult>;

    async fn update(&self, target: &As, criteria: &Criteria, changeset: &Changeset)
        -> Result<u64>;

    async fn delete(&self, target: &As, criteria: &Criteria) -> Result<u64>;

    /// Release connections held by the adapter
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: Db + ?Sized> Db for Arc<T> {
    fn engine(&self) -> &'static str {
        (**self).engine()
    }

    async fn create_schema(&self, target: &As) -> Result<()> {
        (**self).create_schema(target).await
    }

    async fn delete_schema(&self, name: &str) -> Result<()> {
        (**self).delete_schema(name).await
    }

    async fn create(&self, target: &As, record: Record) -> Result<Record> {
        (**self).create(target, record).await
    }

    async fn read(&self, target: &As, mode: ReadMode) -> Result<ReadResult> {
        (**self).read(target, mode).await
    }

    async fn update(
        &self,
        target: &As,
        criteria: &Criteria,
        changeset: &Changeset,
    ) -> Result<u64> {
        (**self).update(target, criteria, changeset).await
    }

    async fn delete(&self, target: &As, criteria: &Criteria) -> Result<u64> {
        (**self).delete(target, criteria).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
