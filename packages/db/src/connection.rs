//! Database connection management with lazy initialization.

use std::sync::LazyLock;
use surrealdb::engine::any::{Any, connect as connect_any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Global database instance using lazy initialization.
static DB: LazyLock<OnceCell<Surreal<Any>>> = LazyLock::new(OnceCell::new);

/// Database connection wrapper.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Connection mode: "mem://", "file://path" or "rocksdb://path"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "jobqueue".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for file-based persistence.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("file://{}", path.into()),
            ..Default::default()
        }
    }

    /// Create a config for RocksDB persistence (requires rocksdb feature).
    pub fn rocksdb(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("rocksdb://{}", path.into()),
            ..Default::default()
        }
    }

    /// Build a config from `JOBQUEUE_DB_*` environment variables.
    ///
    /// Unset variables keep their defaults. Credentials are only applied
    /// when both user and password are present.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = lookup("JOBQUEUE_DB_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(namespace) = lookup("JOBQUEUE_DB_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(database) = lookup("JOBQUEUE_DB_DATABASE") {
            config.database = database;
        }
        if let (Some(user), Some(pass)) = (lookup("JOBQUEUE_DB_USER"), lookup("JOBQUEUE_DB_PASS")) {
            config.credentials = Some((user, pass));
        }
        config
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not initialized - call init_db first")]
    NotInitialized,
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Open a new connection for the given configuration.
pub async fn connect(config: &DbConfig) -> Result<Database, DbError> {
    tracing::info!("Connecting to database: {}", config.endpoint);

    let db = connect_any(config.endpoint.as_str()).await?;

    // Authenticate if credentials provided
    if let Some((username, password)) = &config.credentials {
        db.signin(Root {
            username,
            password,
        })
        .await?;
    }

    // Select namespace and database
    db.use_ns(&config.namespace).use_db(&config.database).await?;

    tracing::info!(
        "Connected to database: {}/{}",
        config.namespace,
        config.database
    );

    Ok(db)
}

/// Initialize the global database connection.
///
/// Later calls return the connection made by the first one.
pub async fn init_db(config: DbConfig) -> Result<&'static Database, DbError> {
    DB.get_or_try_init(|| async { connect(&config).await }).await
}

/// Get the global database connection.
pub fn get_db() -> Result<&'static Database, DbError> {
    DB.get().ok_or(DbError::NotInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        let config = DbConfig::from_lookup(|key| match key {
            "JOBQUEUE_DB_ENDPOINT" => Some("rocksdb://./data/queue".to_string()),
            "JOBQUEUE_DB_NAMESPACE" => Some("ops".to_string()),
            "JOBQUEUE_DB_USER" => Some("root".to_string()),
            _ => None,
        });
        assert_eq!(config.endpoint, "rocksdb://./data/queue");
        assert_eq!(config.namespace, "ops");
        assert_eq!(config.database, "main");
        // Password missing, so no credentials.
        assert!(config.credentials.is_none());
    }

    #[test]
    fn builders() {
        let config = DbConfig::file("./data/surrealdb")
            .with_namespace("ns")
            .with_database("db")
            .with_credentials("root", "secret");
        assert_eq!(config.endpoint, "file://./data/surrealdb");
        assert_eq!(config.namespace, "ns");
        assert_eq!(config.database, "db");
        assert_eq!(
            config.credentials,
            Some(("root".to_string(), "secret".to_string()))
        );
    }
}
