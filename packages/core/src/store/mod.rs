//! Storage seam for queue entries.
//!
//! The dequeue engine holds no locks of its own. Mutual exclusion between
//! consumers rests entirely on [`QueueStore::try_lease`] being a
//! compare-and-swap on the entry's `version`, so every backend must apply the
//! version check and the write atomically.

mod memory;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, JobId, QueueEntry, lease_cutoff};

pub use memory::{InMemoryQueueStore, MemoryStoreError};

/// Entry counts for a single queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Entries without a lease.
    pub enqueued: u64,
    /// Entries carrying a lease timestamp, expired or not.
    pub fetched: u64,
}

impl QueueCounts {
    /// Total entries in the queue.
    pub fn total(&self) -> u64 {
        self.enqueued + self.fetched
    }
}

/// Durable collection of queue entries.
pub trait QueueStore: Send + Sync + 'static {
    /// Backend failure. Surfaced to callers unmodified.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append a new entry.
    fn insert(
        &self,
        entry: QueueEntry,
    ) -> impl Future<Output = Result<QueueEntry, Self::Error>> + Send;

    /// Look up a single entry.
    fn get(
        &self,
        id: EntryId,
    ) -> impl Future<Output = Result<Option<QueueEntry>, Self::Error>> + Send;

    /// Entries of `queue` that are unleased or whose lease is older than `cutoff`.
    fn find_eligible_in(
        &self,
        queue: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<QueueEntry>, Self::Error>> + Send;

    /// Eligible entries across `queues`, earlier names first.
    fn find_eligible<Q>(
        &self,
        queues: &[Q],
        invisibility_timeout: Duration,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<QueueEntry>, Self::Error>> + Send
    where
        Q: AsRef<str> + Sync,
    {
        async move {
            let cutoff = lease_cutoff(now, invisibility_timeout);
            let mut found = Vec::new();
            for queue in queues {
                found.extend(self.find_eligible_in(queue.as_ref(), cutoff, usize::MAX).await?);
            }
            Ok(found)
        }
    }

    /// Stamp the lease on `id` if its version is still `expected_version`.
    ///
    /// Returns the leased entry, or `None` when another writer got there first.
    fn try_lease(
        &self,
        id: EntryId,
        expected_version: u64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<QueueEntry>, Self::Error>> + Send;

    /// Delete `id` if its version is still `expected_version`.
    fn remove(
        &self,
        id: EntryId,
        expected_version: u64,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Clear the lease on `id` if its version is still `expected_version`.
    fn release(
        &self,
        id: EntryId,
        expected_version: u64,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Distinct queue names with at least one entry, sorted.
    fn queue_names(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;

    /// Job ids of unleased entries in `queue`, paged.
    fn enqueued_job_ids(
        &self,
        queue: &str,
        from: usize,
        count: usize,
    ) -> impl Future<Output = Result<Vec<JobId>, Self::Error>> + Send;

    /// Job ids of leased entries in `queue`, paged.
    fn fetched_job_ids(
        &self,
        queue: &str,
        from: usize,
        count: usize,
    ) -> impl Future<Output = Result<Vec<JobId>, Self::Error>> + Send;

    /// Enqueued and fetched counts for `queue`.
    fn counts(&self, queue: &str) -> impl Future<Output = Result<QueueCounts, Self::Error>> + Send;
}
