use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{QueueCounts, QueueStore};
use crate::{EntryId, JobId, QueueEntry};

/// In-memory entry store (not persistent, for testing/dev).
///
/// Entries are kept in insertion order, so scans within one queue are FIFO.
/// Lookups are linear. Every conditional write checks and bumps the version
/// under the lock, which gives the same compare-and-swap semantics a database
/// backend provides. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueStore {
    entries: Arc<Mutex<Vec<QueueEntry>>>,
}

/// In-memory store errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("Lock poisoned")]
    Poisoned,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<QueueEntry>>, MemoryStoreError> {
        self.entries.lock().map_err(|_| MemoryStoreError::Poisoned)
    }

    fn job_ids_where(
        &self,
        queue: &str,
        leased: bool,
        from: usize,
        count: usize,
    ) -> Result<Vec<JobId>, MemoryStoreError> {
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .filter(|e| e.queue == queue && e.is_leased() == leased)
            .skip(from)
            .take(count)
            .map(|e| e.job_id.clone())
            .collect())
    }
}

impl QueueStore for InMemoryQueueStore {
    type Error = MemoryStoreError;

    async fn insert(&self, entry: QueueEntry) -> Result<QueueEntry, Self::Error> {
        let mut entries = self.lock()?;
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: EntryId) -> Result<Option<QueueEntry>, Self::Error> {
        Ok(self.lock()?.iter().find(|e| e.id == id).cloned())
    }

    async fn find_eligible_in(
        &self,
        queue: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, Self::Error> {
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .filter(|e| e.queue == queue && e.is_eligible_before(cutoff))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn try_lease(
        &self,
        id: EntryId,
        expected_version: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>, Self::Error> {
        let mut entries = self.lock()?;
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.version == expected_version => {
                entry.fetched_at = Some(now);
                entry.version += 1;
                Ok(Some(entry.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn remove(&self, id: EntryId, expected_version: u64) -> Result<bool, Self::Error> {
        let mut entries = self.lock()?;
        match entries.iter().position(|e| e.id == id) {
            Some(index) if entries[index].version == expected_version => {
                entries.remove(index);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: EntryId, expected_version: u64) -> Result<bool, Self::Error> {
        let mut entries = self.lock()?;
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.version == expected_version => {
                entry.fetched_at = None;
                entry.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn queue_names(&self) -> Result<Vec<String>, Self::Error> {
        let entries = self.lock()?;
        let names: BTreeSet<&str> = entries.iter().map(|e| e.queue.as_str()).collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    async fn enqueued_job_ids(
        &self,
        queue: &str,
        from: usize,
        count: usize,
    ) -> Result<Vec<JobId>, Self::Error> {
        self.job_ids_where(queue, false, from, count)
    }

    async fn fetched_job_ids(
        &self,
        queue: &str,
        from: usize,
        count: usize,
    ) -> Result<Vec<JobId>, Self::Error> {
        self.job_ids_where(queue, true, from, count)
    }

    async fn counts(&self, queue: &str) -> Result<QueueCounts, Self::Error> {
        let entries = self.lock()?;
        let mut counts = QueueCounts::default();
        for entry in entries.iter().filter(|e| e.queue == queue) {
            if entry.is_leased() {
                counts.fetched += 1;
            } else {
                counts.enqueued += 1;
            }
        }
        Ok(counts)
    }
}
