//! PostgreSQL implementation of [`Db`]

use crate::config::PostgresConfig;
use crate::error::PostgresError;
use crate::typemap::PgTypes;
use async_trait::async_trait;
use quarry_core::{
    As, Changeset, Criteria, Db, QuarryError, ReadMode, ReadResult, Record, Result, TypeMap,
};
use quarry_query::keys::{self, KeyPlan};
use quarry_query::{read_rows, Compiler, Executor, Explain, Postgres, Rendered};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::Row;
use std::sync::Arc;
use tracing::{debug, info};

const ENGINE: &str = "postgres";

/// PostgreSQL adapter over a sqlx pool
#[derive(Clone)]
pub struct PostgresDb {
    pool: PgPool,
    types: PgTypes,
    explain: Arc<Explain>,
}

impl PostgresDb {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            types: PgTypes,
            explain: Default::default(),
        }
    }

    /// Open a pool and check that the server answers
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        info!(engine = ENGINE, max_connections = config.max_connections, "connecting");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(PostgresError::from)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Last statement run against `table`
    pub fn explain(&self, table: &str) -> Option<String> {
        self.explain.last(table)
    }

    fn query<'q>(&self, rendered: &'q Rendered) -> Result<Query<'q, sqlx::Postgres, PgArguments>> {
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
            .map_err(PostgresError::from)?;
        Ok(())
    }
}

#[async_trait]
impl Executor for PostgresDb {
    async fn fetch(&self, table: &str, rendered: Rendered) -> Result<Vec<Record>> {
        self.trace(table, &rendered.sql);
        let rows = self
            .query(&rendered)?
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

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
            .map_err(PostgresError::from)?;
        let n: i64 = row.try_get(0).map_err(PostgresError::from)?;
        Ok(n.max(0) as u64)
    }

    async fn execute(&self, table: &str, rendered: Rendered) -> Result<u64> {
        self.trace(table, &rendered.sql);
        let done = self
            .query(&rendered)?
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl Db for PostgresDb {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    async fn create_schema(&self, target: &As) -> Result<()> {
        let sql = Compiler::new(&Postgres).create_table(target, &self.types)?;
        self.batch(&target.name, &sql).await
    }

    async fn delete_schema(&self, name: &str) -> Result<()> {
        let sql = Compiler::new(&Postgres).drop_table(name)?;
        self.batch(name, &sql).await
    }

    async fn create(&self, target: &As, mut record: Record) -> Result<Record> {
        record.retain(|_, v| !v.is_null());
        let plan = keys::assign(&Postgres, self, target, &mut record).await?;

        let rendered = Compiler::new(&Postgres).insert(target, &record)?;
        self.trace(&target.name, &rendered.sql);
        let returned = self
            .query(&rendered)?
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                let e = PostgresError::from(e);
                if e.is_unique_violation() {
                    duplicate(target, &record)
                } else {
                    e.into()
                }
            })?;

        if let (KeyPlan::Auto, Some(row), Some(column)) =
            (plan, returned, rendered.columns.first())
        {
            let key = self.types.read(&row, 0, column.datatype)?;
            record.insert(column.name.clone(), key);
        }
        Ok(record)
    }

    async fn read(&self, target: &As, mode: ReadMode) -> Result<ReadResult> {
        match mode {
            ReadMode::Count(criteria) => {
                let rendered = Compiler::new(&Postgres).count(target, &criteria)?;
                Ok(ReadResult::Count(Executor::count(self, &target.name, rendered).await?))
            }
            ReadMode::Rows(args) => Ok(ReadResult::Rows(
                read_rows(&Postgres, self, target, args).await?,
            )),
        }
    }

    async fn update(&self, target: &As, criteria: &Criteria, changeset: &Changeset) -> Result<u64> {
        let rendered = Compiler::new(&Postgres).update(target, criteria, changeset)?;
        self.execute(&target.name, rendered).await
    }

    async fn delete(&self, target: &As, criteria: &Criteria) -> Result<u64> {
        let rendered = Compiler::new(&Postgres).delete(target, criteria)?;
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
