//! SurrealDB integration for the job dispatch queue.
//!
//! This crate provides database connectivity, the durable
//! [`SurrealQueueStore`] and the job record repository.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect, get_db, init_db};
pub use repositories::{JobRepository, SurrealQueueStore};
pub use schema::init_schema;

/// Initialize the global database with the given configuration.
///
/// This should be called once at application startup.
pub async fn init(config: DbConfig) -> Result<&'static Database, DbError> {
    let db = init_db(config).await?;
    init_schema(db).await?;
    Ok(db)
}

/// Open a standalone connection with the schema applied.
///
/// Every `mem://` connection is its own datastore, which keeps tests isolated.
pub async fn open(config: &DbConfig) -> Result<Database, DbError> {
    let db = connect(config).await?;
    init_schema(&db).await?;
    Ok(db)
}
