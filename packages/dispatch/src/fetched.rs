//! Handle for a leased queue entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use queue_core::{EntryId, JobId, QueueEntry, QueueError, QueueStore};

/// One leased queue entry, returned by a successful dequeue.
///
/// Finish it with [`remove_from_queue`](Self::remove_from_queue) once the job
/// is done, or hand it back with [`requeue`](Self::requeue). Both consume the
/// handle and only touch the entry if it still carries this handle's lease.
/// A handle that is simply dropped keeps its lease until the invisibility
/// window runs out, after which the entry is handed out again.
pub struct FetchedJob<S: QueueStore> {
    store: Arc<S>,
    entry: QueueEntry,
    fetched_at: DateTime<Utc>,
}

impl<S: QueueStore> FetchedJob<S> {
    pub(crate) fn new(store: Arc<S>, entry: QueueEntry, fetched_at: DateTime<Utc>) -> Self {
        Self {
            store,
            entry,
            fetched_at,
        }
    }

    /// The job this lease dispatches.
    pub fn job_id(&self) -> &JobId {
        &self.entry.job_id
    }

    /// The queue the entry was taken from.
    pub fn queue(&self) -> &str {
        &self.entry.queue
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry.id
    }

    /// When the lease was taken.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// The entry as it was right after leasing.
    pub fn entry(&self) -> &QueueEntry {
        &self.entry
    }

    /// Delete the entry: the job is done.
    pub async fn remove_from_queue(self) -> Result<(), QueueError> {
        let removed = self
            .store
            .remove(self.entry.id, self.entry.version)
            .await
            .map_err(QueueError::storage)?;

        if !removed {
            return Err(self.lease_lost("remove"));
        }

        tracing::debug!(
            "Removed job {} from queue '{}'",
            self.entry.job_id,
            self.entry.queue
        );
        Ok(())
    }

    /// Clear the lease so the entry can be fetched again right away.
    pub async fn requeue(self) -> Result<(), QueueError> {
        let released = self
            .store
            .release(self.entry.id, self.entry.version)
            .await
            .map_err(QueueError::storage)?;

        if !released {
            return Err(self.lease_lost("requeue"));
        }

        tracing::debug!(
            "Requeued job {} on queue '{}'",
            self.entry.job_id,
            self.entry.queue
        );
        Ok(())
    }

    fn lease_lost(&self, action: &str) -> QueueError {
        tracing::warn!(
            "Cannot {} job {}: lease on entry {} taken at {} is no longer held",
            action,
            self.entry.job_id,
            self.entry.id,
            self.fetched_at
        );
        QueueError::LeaseLost(self.entry.id)
    }
}

impl<S: QueueStore> std::fmt::Debug for FetchedJob<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedJob")
            .field("entry", &self.entry)
            .field("fetched_at", &self.fetched_at)
            .finish_non_exhaustive()
    }
}
