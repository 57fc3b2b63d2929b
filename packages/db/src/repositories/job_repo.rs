//! Job repository for CRUD operations.

use queue_core::{Job, JobId};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Datetime;

use crate::{Database, DbError};

const TABLE: &str = "job";

/// Repository for job persistence operations.
///
/// Jobs are owned by whatever enqueues them; the queue only carries their ids.
#[derive(Debug, Clone)]
pub struct JobRepository {
    db: Database,
}

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    payload: serde_json::Value,
    created_at: Datetime,
}

impl JobRecord {
    fn into_job(self, id: JobId) -> Job {
        Job {
            id,
            payload: self.payload,
            created_at: self.created_at.0,
        }
    }
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new job in the database.
    pub async fn create(&self, job: &Job) -> Result<Job, DbError> {
        let record: Option<JobRecord> = self
            .db
            .create((TABLE, job.id.to_string()))
            .content(JobRecord {
                payload: job.payload.clone(),
                created_at: Datetime::from(job.created_at),
            })
            .await?;

        record
            .map(|r| r.into_job(job.id.clone()))
            .ok_or_else(|| DbError::Query("Failed to create job".into()))
    }

    /// Get a job by ID.
    pub async fn get(&self, id: &JobId) -> Result<Job, DbError> {
        let record: Option<JobRecord> = self.db.select((TABLE, id.to_string())).await?;

        record
            .map(|r| r.into_job(id.clone()))
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))
    }

    /// Check if a job exists.
    pub async fn exists(&self, id: &JobId) -> Result<bool, DbError> {
        let record: Option<JobRecord> = self.db.select((TABLE, id.to_string())).await?;

        Ok(record.is_some())
    }

    /// Delete a job.
    pub async fn delete(&self, id: &JobId) -> Result<(), DbError> {
        let _: Option<JobRecord> = self.db.delete((TABLE, id.to_string())).await?;

        Ok(())
    }
}
