//! Per-engine database settings
//!
//! ```toml
//! [database]
//! engine = "postgresql"
//! host = "db.internal"
//! username = "app"
//! password = "{env:DB_PASSWORD}"
//! database = "app"
//! ```
//!
//! Every engine except `memory` also accepts `url`, which wins over the
//! individual connection fields.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use url::Url;

fn localhost() -> String {
    "localhost".to_string()
}

fn memory_path() -> String {
    ":memory:".to_string()
}

fn default_database() -> String {
    "quarry".to_string()
}

/// Which engine to use and how to reach it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum DatabaseConfig {
    #[default]
    Memory,
    Sqlite(SqliteSettings),
    #[serde(rename = "postgresql", alias = "postgres")]
    Postgres(ServerSettings),
    Mysql(ServerSettings),
    Mongodb(ServerSettings),
    Surrealdb(SurrealSettings),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteSettings {
    /// Database file, or `:memory:`
    #[serde(default = "memory_path", alias = "url")]
    pub database: String,
    #[serde(default)]
    pub wal_mode: Option<bool>,
    #[serde(default)]
    pub busy_timeout_ms: Option<u32>,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            database: memory_path(),
            wal_mode: None,
            busy_timeout_ms: None,
        }
    }
}

/// Host-based settings shared by PostgreSQL, MySQL and MongoDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "localhost")]
    pub host: String,
    /// Engine default when unset
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: localhost(),
            port: None,
            username: None,
            password: None,
            database: None,
            max_connections: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurrealSettings {
    #[serde(default)]
    pub url: Option<String>,
    /// `memory` runs the database in process
    #[serde(default = "localhost")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_database")]
    pub namespace: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for SurrealSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: localhost(),
            port: None,
            namespace: default_database(),
            database: default_database(),
            username: None,
            password: None,
        }
    }
}

impl SurrealSettings {
    pub fn is_memory(&self) -> bool {
        self.host == "memory" || self.url.as_deref().is_some_and(|u| u.starts_with("mem://"))
    }

    /// Endpoint for `surrealdb::engine::any`
    pub fn endpoint(&self) -> ConfigResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        if self.host == "memory" {
            return Ok("mem://".to_string());
        }
        let port = self.port.unwrap_or(8000);
        let url = parse("host", &format!("ws://{}:{port}", self.host))?;
        Ok(url.as_str().trim_end_matches('/').to_string())
    }
}

fn parse(field: &str, text: &str) -> ConfigResult<Url> {
    Url::parse(text).map_err(|e| ConfigError::Invalid {
        field: field.to_string(),
        message: e.to_string(),
    })
}

impl DatabaseConfig {
    /// Engine name as written in the `engine` key
    pub fn engine(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgresql",
            Self::Mysql(_) => "mysql",
            Self::Mongodb(_) => "mongodb",
            Self::Surrealdb(_) => "surrealdb",
        }
    }

    /// Connection URL for the host-based engines
    ///
    /// Credentials are percent-encoded. `None` for `memory`, `sqlite` and
    /// `surrealdb`.
    pub fn url(&self) -> ConfigResult<Option<String>> {
        let (scheme, default_port, settings) = match self {
            Self::Postgres(s) => ("postgres", 5432, s),
            Self::Mysql(s) => ("mysql", 3306, s),
            Self::Mongodb(s) => ("mongodb", 27017, s),
            _ => return Ok(None),
        };
        if let Some(url) = &settings.url {
            parse("url", url)?;
            return Ok(Some(url.clone()));
        }

        let port = settings.port.unwrap_or(default_port);
        let mut url = parse("host", &format!("{scheme}://{}:{port}", settings.host))?;
        if let Some(username) = &settings.username {
            url.set_username(username).map_err(|()| ConfigError::Invalid {
                field: "username".to_string(),
                message: "cannot be set on this url".to_string(),
            })?;
        }
        if let Some(password) = &settings.password {
            url.set_password(Some(password)).map_err(|()| ConfigError::Invalid {
                field: "password".to_string(),
                message: "cannot be set on this url".to_string(),
            })?;
        }
        // MongoDB takes the database separately
        if let (Some(database), false) = (&settings.database, matches!(self, Self::Mongodb(_))) {
            url.set_path(database);
        }
        Ok(Some(url.to_string()))
    }
}
