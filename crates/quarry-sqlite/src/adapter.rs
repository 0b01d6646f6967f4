//! SQLite implementation of [`Db`]

use crate::config::SqliteConfig;
use crate::connection::SqlitePool;
use crate::error::{SqliteError, SqliteResult};
use crate::typemap::SqliteTypes;
use async_trait::async_trait;
use quarry_core::{
    As, Changeset, Criteria, Db, QuarryError, ReadMode, ReadResult, Record, Result, TypeMap,
};
use quarry_query::keys::{self, KeyPlan};
use quarry_query::{read_rows, Column, Compiler, Executor, Explain, Rendered, Sqlite};
use rusqlite::types::{ToSql, Value as SqlValue};
use rusqlite::Connection;
use tracing::{debug, info};

const ENGINE: &str = "sqlite";

type Bound = Vec<(String, SqlValue)>;

fn named(params: &Bound) -> Vec<(&str, &dyn ToSql)> {
    params
        .iter()
        .map(|(key, value)| (key.as_str(), value as &dyn ToSql))
        .collect()
}

/// SQLite adapter
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
    types: SqliteTypes,
    explain: std::sync::Arc<Explain>,
}

impl SqliteDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            types: SqliteTypes,
            explain: Default::default(),
        }
    }

    pub fn open(config: SqliteConfig) -> Result<Self> {
        Ok(Self::new(SqlitePool::new(config)?))
    }

    /// In-memory database, mostly for tests
    pub fn memory() -> Result<Self> {
        Self::open(SqliteConfig::memory())
    }

    /// Last statement run against `table`
    pub fn explain(&self, table: &str) -> Option<String> {
        self.explain.last(table)
    }

    fn bind(&self, rendered: &Rendered) -> Result<Bound> {
        rendered
            .params
            .iter()
            .map(|p| Ok((format!("${}", p.key), self.types.bind(p.datatype, &p.value)?)))
            .collect()
    }

    fn decode(&self, columns: &[Column], rows: Vec<Vec<SqlValue>>) -> Result<Vec<Record>> {
        rows.into_iter()
            .map(|row| {
                let mut record = Record::new();
                for (column, wire) in columns.iter().zip(row) {
                    let value = self.types.unbind(column.datatype, wire)?;
                    if !value.is_null() {
                        record.insert(column.name.clone(), value);
                    }
                }
                Ok(record)
            })
            .collect()
    }

    fn trace(&self, table: &str, rendered: &Rendered) {
        debug!(engine = ENGINE, table, sql = %rendered.sql, "statement");
        self.explain.record(table, &rendered.sql);
    }

    /// Run `f` on the blocking pool with the connection locked
    async fn blocking<T, F>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.with_connection(f))
            .await
            .map_err(|e| SqliteError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Executor for SqliteDb {
    async fn fetch(&self, table: &str, rendered: Rendered) -> Result<Vec<Record>> {
        self.trace(table, &rendered);
        let params = self.bind(&rendered)?;
        let width = rendered.columns.len();
        let sql = rendered.sql.clone();
        let rows = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                let mut rows = stmt.query(named(&params).as_slice())?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(width);
                    for i in 0..width {
                        values.push(row.get::<_, SqlValue>(i)?);
                    }
                    out.push(values);
                }
                Ok(out)
            })
            .await?;
        self.decode(&rendered.columns, rows)
    }

    async fn count(&self, table: &str, rendered: Rendered) -> Result<u64> {
        self.trace(table, &rendered);
        let params = self.bind(&rendered)?;
        let sql = rendered.sql;
        let n = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                Ok(stmt.query_row(named(&params).as_slice(), |row| row.get::<_, i64>(0))?)
            })
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn execute(&self, table: &str, rendered: Rendered) -> Result<u64> {
        self.trace(table, &rendered);
        let params = self.bind(&rendered)?;
        let sql = rendered.sql;
        let n = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                Ok(stmt.execute(named(&params).as_slice())?)
            })
            .await?;
        Ok(n as u64)
    }
}

#[async_trait]
impl Db for SqliteDb {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    async fn create_schema(&self, target: &As) -> Result<()> {
        let sql = Compiler::new(&Sqlite).create_table(target, &self.types)?;
        debug!(engine = ENGINE, table = %target.name, sql = %sql, "create table");
        self.explain.record(&target.name, &sql);
        self.blocking(move |conn| Ok(conn.execute_batch(&sql)?))
            .await
            .map_err(Into::into)
    }

    async fn delete_schema(&self, name: &str) -> Result<()> {
        let sql = Compiler::new(&Sqlite).drop_table(name)?;
        debug!(engine = ENGINE, table = name, sql = %sql, "drop table");
        self.blocking(move |conn| Ok(conn.execute_batch(&sql)?))
            .await
            .map_err(Into::into)
    }

    async fn create(&self, target: &As, mut record: Record) -> Result<Record> {
        record.retain(|_, v| !v.is_null());
        let plan = keys::assign(&Sqlite, self, target, &mut record).await?;

        let rendered = Compiler::new(&Sqlite).insert(target, &record)?;
        self.trace(&target.name, &rendered);
        let params = self.bind(&rendered)?;
        let sql = rendered.sql;
        let rowid = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                stmt.execute(named(&params).as_slice())?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    duplicate(target, &record)
                } else {
                    e.into()
                }
            })?;

        if let (KeyPlan::Auto, Some(pk)) = (plan, target.pk.as_deref()) {
            record.insert(pk, keys::assigned(target, rowid)?);
        }
        Ok(record)
    }

    async fn read(&self, target: &As, mode: ReadMode) -> Result<ReadResult> {
        match mode {
            ReadMode::Count(criteria) => {
                let rendered = Compiler::new(&Sqlite).count(target, &criteria)?;
                Ok(ReadResult::Count(Executor::count(self, &target.name, rendered).await?))
            }
            ReadMode::Rows(args) => Ok(ReadResult::Rows(
                read_rows(&Sqlite, self, target, args).await?,
            )),
        }
    }

    async fn update(&self, target: &As, criteria: &Criteria, changeset: &Changeset) -> Result<u64> {
        let rendered = Compiler::new(&Sqlite).update(target, criteria, changeset)?;
        self.execute(&target.name, rendered).await
    }

    async fn delete(&self, target: &As, criteria: &Criteria) -> Result<u64> {
        let rendered = Compiler::new(&Sqlite).delete(target, criteria)?;
        self.execute(&target.name, rendered).await
    }

    async fn close(&self) -> Result<()> {
        info!(engine = ENGINE, path = ?self.pool.config().path, "closing");
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

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{record, DataType, Schema};

    fn events() -> As {
        let schema = Schema::builder()
            .primary("id", DataType::U64)
            .field("title", DataType::String)
            .build("events")
            .unwrap();
        As::new("events", &schema, true)
    }

    #[tokio::test]
    async fn wide_keys_count_up_from_max() {
        let db = SqliteDb::memory().unwrap();
        let target = events();
        db.create_schema(&target).await.unwrap();

        db.create(&target, record! { "id" => 9u64, "title" => "a" })
            .await
            .unwrap();
        let next = db.create(&target, record! { "title" => "b" }).await.unwrap();
        assert_eq!(next.get("id"), Some(&quarry_core::Value::UInt(10)));
    }

    #[tokio::test]
    async fn duplicate_keys_map_to_pk_duplicate() {
        let db = SqliteDb::memory().unwrap();
        let target = events();
        db.create_schema(&target).await.unwrap();
        db.create(&target, record! { "id" => 1u64, "title" => "a" })
            .await
            .unwrap();
        let err = db
            .create(&target, record! { "id" => 1u64, "title" => "b" })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "pk_duplicate");
    }

    #[tokio::test]
    async fn schema_operations_are_idempotent() {
        let db = SqliteDb::memory().unwrap();
        let target = events();
        db.create_schema(&target).await.unwrap();
        db.create_schema(&target).await.unwrap();
        db.delete_schema("events").await.unwrap();
        db.delete_schema("events").await.unwrap();
    }
}
