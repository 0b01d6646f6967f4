//! SurrealDB connection settings

/// Endpoint, namespace and database to use
///
/// `endpoint` is anything `surrealdb::engine::any` accepts: `mem://` for an
/// in-process database, `ws://host:port` for a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurrealConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials; skipped for `mem://`
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SurrealConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn is_memory(&self) -> bool {
        self.endpoint.starts_with("mem://")
    }
}

impl Default for SurrealConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "quarry".to_string(),
            database: "quarry".to_string(),
            username: None,
            password: None,
        }
    }
}
