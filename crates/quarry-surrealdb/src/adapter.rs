//! SurrealDB implementation of [`Db`]
//!
//! One schemafull table per store. Records get random record ids; the
//! primary key is an ordinary field behind a unique index. Relations load
//! in phases, like MongoDB.

use crate::config::SurrealConfig;
use crate::error::{SurrealError, SurrealResult};
use crate::surql::{self, Builder, Statement};
use crate::typemap::{plain, SurrealTypes};
use async_trait::async_trait;
use quarry_core::relation::{self, Phase};
use quarry_core::{
    sortable, As, Changeset, Criteria, DataType, Db, QuarryError, ReadArgs, ReadMode,
    ReadResult, Record, Result, Sort, TypeMap, Value,
};
use quarry_query::keys::{self, KeyPlan};
use serde_json::Value as Json;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, info};
use uuid::Uuid;

const ENGINE: &str = "surrealdb";

/// SurrealDB adapter
#[derive(Clone)]
pub struct SurrealDb {
    db: Surreal<Any>,
    types: SurrealTypes,
}

impl std::fmt::Debug for SurrealDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealDb").finish_non_exhaustive()
    }
}

impl SurrealDb {
    pub fn new(db: Surreal<Any>) -> Self {
        Self {
            db,
            types: SurrealTypes,
        }
    }

    /// Open `config.endpoint` and select the namespace and database
    pub async fn connect(config: &SurrealConfig) -> Result<Self> {
        info!(engine = ENGINE, endpoint = %config.endpoint, "connecting");
        Ok(Self::new(Self::open(config).await?))
    }

    async fn open(config: &SurrealConfig) -> SurrealResult<Surreal<Any>> {
        let db = any::connect(config.endpoint.as_str())
            .await
            .map_err(|e| SurrealError::Connection(e.to_string()))?;
        if let (Some(username), Some(password), false) =
            (&config.username, &config.password, config.is_memory())
        {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await
            .map_err(|e| SurrealError::Connection(e.to_string()))?;
        }
        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;
        Ok(db)
    }

    /// Run `statement`, returning the plain result of statement `index`
    async fn run(&self, table: &str, statement: Statement, index: usize) -> SurrealResult<Json> {
        debug!(engine = ENGINE, table, sql = %statement.sql, "query");
        let mut query = self.db.query(statement.sql);
        for (key, value) in statement.params {
            query = query.bind((key, value));
        }
        let mut response = query
            .await?
            .check()
            .map_err(|e| SurrealError::Query(e.to_string()))?;
        let value: surrealdb::Value = response.take(index)?;
        Ok(plain(serde_json::to_value(&value)?))
    }

    async fn rows(&self, table: &str, statement: Statement) -> SurrealResult<Vec<Json>> {
        Ok(match self.run(table, statement, 0).await? {
            Json::Array(rows) => rows,
            Json::Null => Vec::new(),
            other => vec![other],
        })
    }

    fn decode(&self, target: &As, fields: &[String], row: Json) -> Result<Record> {
        let Json::Object(mut row) = row else {
            return Err(QuarryError::Decode {
                engine: ENGINE,
                field: target.name.clone(),
                message: format!("expected an object, got {row}"),
            });
        };
        let mut record = Record::new();
        for field in fields {
            let Some(datatype) = target.datatype(field) else {
                continue;
            };
            let wire = row.remove(surql::stored(field)).unwrap_or(Json::Null);
            let value = self.types.unbind(datatype, wire)?;
            if !value.is_null() {
                record.insert(field.clone(), value);
            }
        }
        Ok(record)
    }

    async fn select(
        &self,
        target: &As,
        criteria: &Criteria,
        within: Option<(&str, &[Value])>,
        sort: Option<&Sort>,
        limit: Option<u64>,
    ) -> Result<Vec<Record>> {
        let statement = Builder::new(&self.types, target).select(criteria, within, sort, limit)?;
        let rows = self.rows(&target.name, statement).await?;
        let fields = target.field_names();
        rows.into_iter()
            .map(|row| self.decode(target, &fields, row))
            .collect()
    }

    async fn max_key(&self, target: &As, pk: &str, datatype: DataType) -> Result<Value> {
        let statement = Builder::new(&self.types, target).max_key()?;
        let rows = self.rows(&target.name, statement).await?;
        let max = rows
            .into_iter()
            .next()
            .map(|row| self.decode(target, &[pk.to_string()], row))
            .transpose()?;
        sortable::next_key(&target.name, datatype, max.as_ref().and_then(|r| r.get(pk)))
    }

    async fn read_rows(&self, target: &As, args: ReadArgs) -> Result<Vec<Record>> {
        let rows = self
            .select(target, &args.criteria, None, args.sort.as_ref(), args.limit)
            .await?;
        let mut out: Vec<Record> = rows
            .iter()
            .cloned()
            .map(|row| relation::project(row, args.fields.as_deref()))
            .collect();

        for (name, relation) in &args.with {
            let phase = Phase::plan(target, name, relation)?;
            let keys = phase.keys(&rows);
            if keys.is_empty() {
                phase.attach_empty(&mut out);
                continue;
            }
            let related = self
                .select(
                    &relation.target,
                    &relation.criteria,
                    Some((phase.by, &keys)),
                    relation.sort.as_ref(),
                    None,
                )
                .await?;
            phase.attach(&rows, &mut out, related);
        }
        Ok(out)
    }

    /// Number of records a `RETURN BEFORE` statement touched
    async fn touched(&self, table: &str, statement: Statement) -> Result<u64> {
        let rows = self.rows(table, statement).await?;
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl Db for SurrealDb {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    async fn create_schema(&self, target: &As) -> Result<()> {
        let sql = Builder::new(&self.types, target).define()?;
        let statement = Statement {
            sql,
            params: Vec::new(),
        };
        self.run(&target.name, statement, 0).await?;
        debug!(engine = ENGINE, table = %target.name, "table ready");
        Ok(())
    }

    async fn delete_schema(&self, name: &str) -> Result<()> {
        let statement = Builder::remove(name)?;
        self.run(name, statement, 0).await?;
        Ok(())
    }

    async fn create(&self, target: &As, mut record: Record) -> Result<Record> {
        record.retain(|_, v| !v.is_null());
        if let (Some(pk), Some(datatype)) = (target.pk.as_deref(), target.pk_type()) {
            match keys::plan(target, &record)? {
                KeyPlan::Uuid => {
                    record.insert(pk, Uuid::new_v4().to_string());
                }
                KeyPlan::Auto | KeyPlan::Max => {
                    let next = self.max_key(target, pk, datatype).await?;
                    record.insert(pk, next);
                }
                KeyPlan::None | KeyPlan::Given => {}
            }
        }

        let statement = Builder::new(&self.types, target).create(&record)?;
        if let Err(e) = self.run(&target.name, statement, 1).await {
            return Err(if e.is_unique_violation() {
                QuarryError::PkDuplicate {
                    store: target.name.clone(),
                    value: target
                        .pk
                        .as_deref()
                        .and_then(|pk| record.get(pk))
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                }
            } else {
                e.into()
            });
        }
        Ok(record)
    }

    async fn read(&self, target: &As, mode: ReadMode) -> Result<ReadResult> {
        match mode {
            ReadMode::Count(criteria) => {
                let statement = Builder::new(&self.types, target).count(&criteria)?;
                let rows = self.rows(&target.name, statement).await?;
                let n = rows
                    .first()
                    .and_then(|row| row.get("n"))
                    .and_then(Json::as_u64)
                    .unwrap_or(0);
                Ok(ReadResult::Count(n))
            }
            ReadMode::Rows(args) => Ok(ReadResult::Rows(self.read_rows(target, args).await?)),
        }
    }

    async fn update(&self, target: &As, criteria: &Criteria, changeset: &Changeset) -> Result<u64> {
        let statement = Builder::new(&self.types, target).update(criteria, changeset)?;
        self.touched(&target.name, statement).await
    }

    async fn delete(&self, target: &As, criteria: &Criteria) -> Result<u64> {
        let statement = Builder::new(&self.types, target).delete(criteria)?;
        self.touched(&target.name, statement).await
    }

    /// The connection closes when the last clone is dropped
    async fn close(&self) -> Result<()> {
        info!(engine = ENGINE, "closing");
        Ok(())
    }
}
