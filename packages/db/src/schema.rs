//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes. Safe to run
/// against an already initialized database.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    // Queue entry table
    db.query(QUEUE_ENTRY_SCHEMA).await?.check()?;

    // Job table
    db.query(JOB_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Queue entry table schema.
const QUEUE_ENTRY_SCHEMA: &str = r#"
-- One row per "job X is waiting in queue Y"
DEFINE TABLE IF NOT EXISTS queue_entry SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS job_id ON queue_entry TYPE string;
DEFINE FIELD IF NOT EXISTS queue ON queue_entry TYPE string;
DEFINE FIELD IF NOT EXISTS fetched_at ON queue_entry TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS version ON queue_entry TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS lease_token ON queue_entry TYPE option<string>;

-- Indexes for polling and monitoring
DEFINE INDEX IF NOT EXISTS queue_entry_queue ON queue_entry FIELDS queue;
DEFINE INDEX IF NOT EXISTS queue_entry_queue_fetched ON queue_entry FIELDS queue, fetched_at;
DEFINE INDEX IF NOT EXISTS queue_entry_job ON queue_entry FIELDS job_id;
"#;

/// Job table schema. Payloads are arbitrary JSON.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMALESS;

DEFINE FIELD IF NOT EXISTS created_at ON job TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS job_created ON job FIELDS created_at;
"#;
