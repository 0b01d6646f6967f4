//! MySQL implementation of [`Db`]

use crate::config::MySqlConfig;
use crate::error::MySqlError;
use crate::typemap::MySqlTypes;
use async_trait::async_trait;
use quarry_core::{
    As, Changeset, Criteria, Db, QuarryError, ReadMode, ReadResult, Record, Result, TypeMap,
};
use quarry_query::keys::{self, KeyPlan};
use quarry_query::{read_rows, Compiler, Executor, Explain, MySql, Rendered};
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions};
use sqlx::query::Query;
use sqlx::Row;
use std::sync::Arc;
use tracing::{debug, info};

const ENGINE: &str = "mysql";

/// MySQL adapter over a sqlx pool
#[derive(Clone)]
pub struct MySqlDb {
    pool: MySqlPool,
    types: MySqlTypes,
    explain: Arc<Explain>,
}

impl MySqlDb {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            types: MySqlTypes,
            explain: Default::default(),
        }
    }

    pub async fn connect(config: &MySqlConfig) -> Result<Self> {
        info!(engine = ENGINE, max_connections = config.max_connections, "connecting");
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(MySqlError::from)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Last statement run against `table`
    pub fn explain(&self, table: &str) -> Option<String> {
        self.explain.last(table)
    }

    /// Parameters bind positionally, in the order the compiler emitted them
    fn query<'q>(&self, rendered: &'q Rendered) -> Result<Query<'q, sqlx::MySql, MySqlArguments>> {
        let mut query = sqlx::query(sqlx::AssertSqlSafe(rendered.sql.as_str()));
        for param in &rendered.params {
            query = self.types.bind(param.datatype, &param.value)?.bind_to(query);
        }
        Ok(query)
    }

    fn trace(&self, table: &str, sql: &str) {
        debug!(engine = ENGINE, table, sql = %sql, "statement");
        self.explain.record(table, sql);
    }

    async fn batch(&self, table: &str, sql: &str) -> Result<()> {
        self.trace(table, sql);
        sqlx::raw_sql(sqlx::AssertSqlSafe(sql))
            .execute(&self.pool)
            .await
            .map_err(MySqlError::from)?;
        Ok(())
    }
}

#[async_trait]
impl Executor for MySqlDb {
    async fn fetch(&self, table: &str, rendered: Rendered) -> Result<Vec<Record>> {
        self.trace(table, &rendered.sql);
        let rows = self
            .query(&rendered)?
            .fetch_all(&self.pool)
            .await
            .map_err(MySqlError::from)?;

        rows.iter()
            .map(|row| {
                let mut record = Record::new();
                for (i, column) in rendered.columns.iter().enumerate() {
                    let value = self.types.read(row, i, column.datatype)?;
                    if !value.is_null() {
                        record.insert(column.name.clone(), value);
                    }
                }
                Ok(record)
            })
            .collect()
    }

    async fn count(&self, table: &str, rendered: Rendered) -> Result<u64> {
        self.trace(table, &rendered.sql);
        let row = self
            .query(&rendered)?
            .fetch_one(&self.pool)
            .await
            .map_err(MySqlError::from)?;
        let n: i64 = row.try_get(0).map_err(MySqlError::from)?;
        Ok(n.max(0) as u64)
    }

    /// Rows matched, not rows changed
    async fn execute(&self, table: &str, rendered: Rendered) -> Result<u64> {
        self.trace(table, &rendered.sql);
        let done = self
            .query(&rendered)?
            .execute(&self.pool)
            .await
            .map_err(MySqlError::from)?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl Db for MySqlDb {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    async fn create_schema(&self, target: &As) -> Result<()> {
        let sql = Compiler::new(&MySql).create_table(target, &self.types)?;
        self.batch(&target.name, &sql).await
    }

    async fn delete_schema(&self, name: &str) -> Result<()> {
        let sql = Compiler::new(&MySql).drop_table(name)?;
        self.batch(name, &sql).await
    }

    async fn create(&self, target: &As, mut record: Record) -> Result<Record> {
        record.retain(|_, v| !v.is_null());
        let plan = keys::assign(&MySql, self, target, &mut record).await?;

        let rendered = Compiler::new(&MySql).insert(target, &record)?;
        self.trace(&target.name, &rendered.sql);
        let done = self
            .query(&rendered)?
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let e = MySqlError::from(e);
                if e.is_unique_violation() {
                    duplicate(target, &record)
                } else {
                    e.into()
                }
            })?;

        if let (KeyPlan::Auto, Some(pk)) = (plan, target.pk.as_deref()) {
            let id = i64::try_from(done.last_insert_id()).map_err(|e| QuarryError::Decode {
                engine: ENGINE,
                field: pk.to_string(),
                message: e.to_string(),
            })?;
            record.insert(pk, keys::assigned(target, id)?);
        }
        Ok(record)
    }

    async fn read(&self, target: &As, mode: ReadMode) -> Result<ReadResult> {
        match mode {
            ReadMode::Count(criteria) => {
                let rendered = Compiler::new(&MySql).count(target, &criteria)?;
                Ok(ReadResult::Count(Executor::count(self, &target.name, rendered).await?))
            }
            ReadMode::Rows(args) => {
                Ok(ReadResult::Rows(read_rows(&MySql, self, target, args).await?))
            }
        }
    }

    async fn update(&self, target: &As, criteria: &Criteria, changeset: &Changeset) -> Result<u64> {
        let rendered = Compiler::new(&MySql).update(target, criteria, changeset)?;
        self.execute(&target.name, rendered).await
    }

    async fn delete(&self, target: &As, criteria: &Criteria) -> Result<u64> {
        let rendered = Compiler::new(&MySql).delete(target, criteria)?;
        self.execute(&target.name, rendered).await
    }

    async fn close(&self) -> Result<()> {
        info!(engine = ENGINE, "closing pool");
        self.pool.close().await;
        Ok(())
    }
}

fn duplicate(target: &As, record: &Record) -> QuarryError {
    QuarryError::PkDuplicate {
        store: target.name.clone(),
        value: target
            .pk
            .as_deref()
            .and_then(|pk| record.get(pk))
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}
