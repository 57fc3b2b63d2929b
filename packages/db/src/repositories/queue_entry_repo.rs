//! Durable queue entry store backed by SurrealDB.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use queue_core::{EntryId, JobId, QueueCounts, QueueEntry, QueueStore};
use serde::{Deserialize, Serialize};
use surrealdb::error::Db;
use surrealdb::sql::{Datetime, Thing};
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::{Database, DbError, get_db};

const TABLE: &str = "queue_entry";

const LEASE: &str = "UPDATE type::thing('queue_entry', $id) SET fetched_at = $now, lease_token = $lease_token, version += 1 WHERE version = $version RETURN AFTER";
const RELEASE: &str = "UPDATE type::thing('queue_entry', $id) SET fetched_at = NONE, lease_token = NONE, version += 1 WHERE version = $version RETURN AFTER";
const REMOVE: &str = "DELETE type::thing('queue_entry', $id) WHERE version = $version RETURN BEFORE";
const LEASE_HOLDER: &str = "SELECT version, lease_token FROM type::thing('queue_entry', $id)";

/// Conditional writes issued from this process take turns.
///
/// The embedded engines can commit two overlapping guarded updates of the
/// same record, so a version check alone does not exclude a second winner.
/// Writers in other processes are caught by the lease token read-back.
static CONDITIONAL_WRITES: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Queue entry persistence.
///
/// Conditional writes are single `UPDATE`/`DELETE` statements guarded by
/// `WHERE version = $version`. A lease also stamps a fresh token and only
/// counts once the stored record is seen carrying it. Clones share the same
/// connection.
#[derive(Debug, Clone)]
pub struct SurrealQueueStore {
    db: Database,
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct EntryRecord {
    id: Thing,
    job_id: String,
    queue: String,
    #[serde(default)]
    fetched_at: Option<Datetime>,
    #[serde(default)]
    version: u64,
}

impl EntryRecord {
    fn into_entry(self) -> Result<QueueEntry, DbError> {
        let raw = self.id.id.to_raw();
        let id = EntryId::parse(&raw)
            .map_err(|e| DbError::Serialization(format!("Invalid entry id {raw}: {e}")))?;
        Ok(QueueEntry {
            id,
            job_id: JobId::from(self.job_id),
            queue: self.queue,
            fetched_at: self.fetched_at.map(|dt| dt.0),
            version: self.version,
        })
    }
}

/// Struct for creating entries - the record id carries the entry id.
#[derive(Debug, Serialize)]
struct EntryCreate {
    job_id: String,
    queue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fetched_at: Option<Datetime>,
    version: u64,
}

/// Bindings for a guarded write.
#[derive(Debug, Serialize)]
struct WriteGuard {
    id: String,
    version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    now: Option<Datetime>,
    #[serde(rename = "lease_token", skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl WriteGuard {
    fn new(id: EntryId, expected_version: u64) -> Self {
        Self {
            id: id.to_string(),
            version: expected_version as i64,
            now: None,
            token: None,
        }
    }
}

#[derive(Deserialize)]
struct LeaseRow {
    version: u64,
    #[serde(default)]
    lease_token: Option<String>,
}

#[derive(Deserialize)]
struct JobIdRow {
    job_id: String,
}

#[derive(Deserialize)]
struct QueueRow {
    queue: String,
}

#[derive(Deserialize)]
struct CountRow {
    count: i64,
}

/// A guarded write whose transaction failed to commit did not apply.
/// For a conditional write that is the same outcome as a version mismatch.
fn is_write_conflict(error: &surrealdb::Error) -> bool {
    matches!(
        error,
        surrealdb::Error::Db(Db::TxRetryable | Db::QueryNotExecutedDetail { .. })
    )
}

/// `LIMIT` and `START` only take values that fit a `u32`.
fn bounded(n: usize) -> Option<u32> {
    u32::try_from(n).ok()
}

impl SurrealQueueStore {
    /// Create a store over an open connection.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a store over the global connection.
    pub fn global() -> Result<Self, DbError> {
        Ok(Self::new(get_db()?.clone()))
    }

    /// Run a guarded single-record write and collect the affected records.
    ///
    /// A write conflict is reported as "no records affected". Callers hold
    /// [`CONDITIONAL_WRITES`].
    async fn conditional(
        &self,
        query: &'static str,
        guard: WriteGuard,
    ) -> Result<Vec<EntryRecord>, DbError> {
        let id = guard.id.clone();
        let outcome = async {
            let mut response = self.db.query(query).bind(guard).await?;
            let records: Vec<EntryRecord> = response.take(0)?;
            Ok::<_, surrealdb::Error>(records)
        }
        .await;

        match outcome {
            Ok(records) => Ok(records),
            Err(e) if is_write_conflict(&e) => {
                tracing::trace!("Write conflict on queue entry {}: {}", id, e);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the stored entry carries the lease stamped with `token`.
    async fn holds_lease(&self, id: EntryId, version: u64, token: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(LEASE_HOLDER)
            .bind(("id", id.to_string()))
            .await?;

        let rows: Vec<LeaseRow> = result.take(0)?;

        Ok(rows
            .first()
            .is_some_and(|row| row.version == version && row.lease_token.as_deref() == Some(token)))
    }

    async fn job_ids_where(
        &self,
        filter: &str,
        queue: &str,
        from: usize,
        count: usize,
    ) -> Result<Vec<JobId>, DbError> {
        // Nothing can sit past the largest offset SurrealDB accepts.
        let Some(start) = bounded(from) else {
            return Ok(Vec::new());
        };
        let limit = bounded(count);

        let mut query = format!(
            "SELECT id, job_id FROM queue_entry WHERE queue = $queue AND {filter} ORDER BY id ASC"
        );
        if limit.is_some() {
            query.push_str(" LIMIT $limit");
        }
        query.push_str(" START $start");

        let mut request = self
            .db
            .query(query)
            .bind(("queue", queue.to_string()))
            .bind(("start", start));
        if let Some(limit) = limit {
            request = request.bind(("limit", limit));
        }

        let rows: Vec<JobIdRow> = request.await?.take(0)?;

        Ok(rows.into_iter().map(|r| JobId::from(r.job_id)).collect())
    }
}

impl QueueStore for SurrealQueueStore {
    type Error = DbError;

    async fn insert(&self, entry: QueueEntry) -> Result<QueueEntry, DbError> {
        let create_data = EntryCreate {
            job_id: entry.job_id.to_string(),
            queue: entry.queue.clone(),
            fetched_at: entry.fetched_at.map(Datetime::from),
            version: entry.version,
        };

        let record: Option<EntryRecord> = self
            .db
            .create((TABLE, entry.id.to_string()))
            .content(create_data)
            .await?;

        record
            .ok_or_else(|| DbError::Query("Failed to create queue entry".into()))?
            .into_entry()
    }

    async fn get(&self, id: EntryId) -> Result<Option<QueueEntry>, DbError> {
        let record: Option<EntryRecord> = self.db.select((TABLE, id.to_string())).await?;

        record.map(EntryRecord::into_entry).transpose()
    }

    async fn find_eligible_in(
        &self,
        queue: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, DbError> {
        let limit = bounded(limit);
        let mut query = String::from(
            "SELECT * FROM queue_entry WHERE queue = $queue AND (fetched_at = NONE OR fetched_at < $cutoff) ORDER BY id ASC",
        );
        if limit.is_some() {
            query.push_str(" LIMIT $limit");
        }

        let mut request = self
            .db
            .query(query)
            .bind(("queue", queue.to_string()))
            .bind(("cutoff", Datetime::from(cutoff)));
        if let Some(limit) = limit {
            request = request.bind(("limit", limit));
        }

        let records: Vec<EntryRecord> = request.await?.take(0)?;

        records.into_iter().map(EntryRecord::into_entry).collect()
    }

    async fn try_lease(
        &self,
        id: EntryId,
        expected_version: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>, DbError> {
        let _turn = CONDITIONAL_WRITES.lock().await;
        let token = Ulid::new().to_string();

        let guard = WriteGuard {
            now: Some(Datetime::from(now)),
            token: Some(token.clone()),
            ..WriteGuard::new(id, expected_version)
        };
        let Some(record) = self.conditional(LEASE, guard).await?.into_iter().next() else {
            return Ok(None);
        };

        if !self.holds_lease(id, expected_version + 1, &token).await? {
            tracing::debug!("Lease on queue entry {} was overwritten by another writer", id);
            return Ok(None);
        }

        record.into_entry().map(Some)
    }

    async fn remove(&self, id: EntryId, expected_version: u64) -> Result<bool, DbError> {
        let _turn = CONDITIONAL_WRITES.lock().await;
        let records = self
            .conditional(REMOVE, WriteGuard::new(id, expected_version))
            .await?;

        Ok(!records.is_empty())
    }

    async fn release(&self, id: EntryId, expected_version: u64) -> Result<bool, DbError> {
        let _turn = CONDITIONAL_WRITES.lock().await;
        let records = self
            .conditional(RELEASE, WriteGuard::new(id, expected_version))
            .await?;

        Ok(!records.is_empty())
    }

    async fn queue_names(&self) -> Result<Vec<String>, DbError> {
        let mut result = self
            .db
            .query("SELECT queue FROM queue_entry GROUP BY queue")
            .await?;

        let rows: Vec<QueueRow> = result.take(0)?;

        let mut names: Vec<String> = rows.into_iter().map(|r| r.queue).collect();
        names.sort();
        Ok(names)
    }

    async fn enqueued_job_ids(
        &self,
        queue: &str,
        from: usize,
        count: usize,
    ) -> Result<Vec<JobId>, DbError> {
        self.job_ids_where(
            "fetched_at = NONE",
            queue,
            from,
            count,
        )
        .await
    }

    async fn fetched_job_ids(
        &self,
        queue: &str,
        from: usize,
        count: usize,
    ) -> Result<Vec<JobId>, DbError> {
        self.job_ids_where(
            "fetched_at != NONE",
            queue,
            from,
            count,
        )
        .await
    }

    async fn counts(&self, queue: &str) -> Result<QueueCounts, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT count() AS count FROM queue_entry WHERE queue = $queue AND fetched_at = NONE GROUP ALL;
                SELECT count() AS count FROM queue_entry WHERE queue = $queue AND fetched_at != NONE GROUP ALL;
                "#,
            )
            .bind(("queue", queue.to_string()))
            .await?;

        let enqueued: Vec<CountRow> = result.take(0)?;
        let fetched: Vec<CountRow> = result.take(1)?;

        let total = |rows: Vec<CountRow>| rows.first().map_or(0, |r| r.count.max(0) as u64);

        Ok(QueueCounts {
            enqueued: total(enqueued),
            fetched: total(fetched),
        })
    }
}
