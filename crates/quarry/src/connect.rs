//! Build the configured adapter

use quarry_config::{ConfigError, DatabaseConfig, QuarryConfig};
use quarry_core::{Db, MemoryDb, QuarryError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn config_error(err: ConfigError) -> QuarryError {
    QuarryError::Connection(err.to_string())
}

#[allow(dead_code)]
fn compiled_out(engine: &str, feature: &str) -> QuarryError {
    QuarryError::Connection(format!(
        "engine `{engine}` is not available; enable the `{feature}` feature of quarry"
    ))
}

/// Open a connection to the database `config` describes
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Db>> {
    info!(engine = config.engine(), "opening database");
    match config {
        DatabaseConfig::Memory => Ok(Arc::new(MemoryDb::new())),

        #[cfg(feature = "sqlite")]
        DatabaseConfig::Sqlite(settings) => {
            let mut sqlite = quarry_sqlite::SqliteConfig::new(&settings.database);
            if let Some(wal_mode) = settings.wal_mode {
                sqlite.wal_mode = wal_mode;
            }
            if let Some(busy_timeout_ms) = settings.busy_timeout_ms {
                sqlite.busy_timeout_ms = busy_timeout_ms;
            }
            Ok(Arc::new(quarry_sqlite::SqliteDb::open(sqlite)?))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseConfig::Sqlite(_) => Err(compiled_out("sqlite", "sqlite")),

        #[cfg(feature = "postgres")]
        DatabaseConfig::Postgres(settings) => {
            let url = config.url().map_err(config_error)?.unwrap_or_default();
            let mut postgres = quarry_postgres::PostgresConfig::new(url);
            if let Some(n) = settings.max_connections {
                postgres = postgres.max_connections(n);
            }
            Ok(Arc::new(quarry_postgres::PostgresDb::connect(&postgres).await?))
        }
        #[cfg(not(feature = "postgres"))]
        DatabaseConfig::Postgres(_) => Err(compiled_out("postgresql", "postgres")),

        #[cfg(feature = "mysql")]
        DatabaseConfig::Mysql(settings) => {
            let url = config.url().map_err(config_error)?.unwrap_or_default();
            let mut mysql = quarry_mysql::MySqlConfig::new(url);
            if let Some(n) = settings.max_connections {
                mysql = mysql.max_connections(n);
            }
            Ok(Arc::new(quarry_mysql::MySqlDb::connect(&mysql).await?))
        }
        #[cfg(not(feature = "mysql"))]
        DatabaseConfig::Mysql(_) => Err(compiled_out("mysql", "mysql")),

        #[cfg(feature = "mongodb")]
        DatabaseConfig::Mongodb(settings) => {
            let uri = config.url().map_err(config_error)?.unwrap_or_default();
            let database = settings.database.as_deref().unwrap_or("quarry");
            let mongo = quarry_mongodb::MongoConfig::new(uri, database);
            Ok(Arc::new(quarry_mongodb::MongoDb::connect(&mongo).await?))
        }
        #[cfg(not(feature = "mongodb"))]
        DatabaseConfig::Mongodb(_) => Err(compiled_out("mongodb", "mongodb")),

        #[cfg(feature = "surrealdb")]
        DatabaseConfig::Surrealdb(settings) => {
            let endpoint = settings.endpoint().map_err(config_error)?;
            let mut surreal = quarry_surrealdb::SurrealConfig::new(endpoint)
                .namespace(&settings.namespace)
                .database(&settings.database);
            if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
                surreal = surreal.credentials(username, password);
            }
            Ok(Arc::new(quarry_surrealdb::SurrealDb::connect(&surreal).await?))
        }
        #[cfg(not(feature = "surrealdb"))]
        DatabaseConfig::Surrealdb(_) => Err(compiled_out("surrealdb", "surrealdb")),
    }
}

/// Load a config file and connect to its `[database]`
pub async fn connect_file(path: impl AsRef<Path>) -> Result<Arc<dyn Db>> {
    let config = QuarryConfig::load(path).map_err(config_error)?;
    connect(&config.database).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn memory_by_default() {
        let db = connect(&DatabaseConfig::default()).await.unwrap();
        assert_eq!(db.engine(), "memory");
        assert!(logs_contain("opening database"));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn sqlite_in_memory() {
        let config = DatabaseConfig::Sqlite(quarry_config::SqliteSettings::default());
        let db = connect(&config).await.unwrap();
        assert_eq!(db.engine(), "sqlite");
    }

    #[cfg(not(feature = "mysql"))]
    #[tokio::test]
    async fn compiled_out_engine_names_the_feature() {
        let config = DatabaseConfig::Mysql(quarry_config::ServerSettings::default());
        let err = connect(&config).await.err().unwrap();
        assert_eq!(err.code(), "connection");
        assert!(err.to_string().contains("`mysql` feature"));
    }

    #[tokio::test]
    async fn missing_config_file_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = connect_file(dir.path().join("absent.toml")).await.err().unwrap();
        assert_eq!(err.code(), "connection");
    }
}
