#![allow(dead_code)]

use std::sync::LazyLock;

use tokio::sync::{Mutex, MutexGuard};

use db::{Database, DbConfig, DbError};

static TEST_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Fresh in-memory datastore with the schema applied.
pub async fn open_db() -> Result<Database, DbError> {
    db::open(&DbConfig::memory()).await
}

/// Initialize the global connection and clear it for exclusive use.
pub async fn setup_global_db() -> Result<MutexGuard<'static, ()>, DbError> {
    let guard = TEST_LOCK.lock().await;
    db::init(DbConfig::memory()).await?;
    let db_conn = db::get_db()?;
    db_conn.query("DELETE queue_entry; DELETE job;").await?;
    Ok(guard)
}
