#![allow(dead_code)]

use std::io;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use db::{DbConfig, DbError, SurrealQueueStore};
use dispatch::JobQueue;
use queue_core::{
    Clock, EntryId, InMemoryQueueStore, JobId, QueueCounts, QueueEntry, QueueOptions, QueueStore,
};

pub const POLL: Duration = Duration::from_millis(50);

pub fn options() -> QueueOptions {
    QueueOptions::default()
        .with_poll_interval(POLL)
        .with_invisibility_timeout(Duration::from_secs(60))
}

pub fn memory_queue() -> JobQueue<InMemoryQueueStore> {
    JobQueue::new(InMemoryQueueStore::new(), options()).expect("valid options")
}

pub async fn surreal_queue() -> Result<JobQueue<SurrealQueueStore>, DbError> {
    let db = db::open(&DbConfig::memory()).await?;
    Ok(JobQueue::new(SurrealQueueStore::new(db), options()).expect("valid options"))
}

/// Wall clock shifted by a fixed amount.
pub struct OffsetClock(pub TimeDelta);

impl Clock for OffsetClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.0
    }
}

/// Store whose every call fails.
pub struct FailingStore;

fn broken() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionReset, "store unavailable")
}

impl QueueStore for FailingStore {
    type Error = io::Error;

    async fn insert(&self, _entry: QueueEntry) -> Result<QueueEntry, io::Error> {
        Err(broken())
    }

    async fn get(&self, _id: EntryId) -> Result<Option<QueueEntry>, io::Error> {
        Err(broken())
    }

    async fn find_eligible_in(
        &self,
        _queue: &str,
        _cutoff: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<QueueEntry>, io::Error> {
        Err(broken())
    }

    async fn try_lease(
        &self,
        _id: EntryId,
        _expected_version: u64,
        _now: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>, io::Error> {
        Err(broken())
    }

    async fn remove(&self, _id: EntryId, _expected_version: u64) -> Result<bool, io::Error> {
        Err(broken())
    }

    async fn release(&self, _id: EntryId, _expected_version: u64) -> Result<bool, io::Error> {
        Err(broken())
    }

    async fn queue_names(&self) -> Result<Vec<String>, io::Error> {
        Err(broken())
    }

    async fn enqueued_job_ids(
        &self,
        _queue: &str,
        _from: usize,
        _count: usize,
    ) -> Result<Vec<JobId>, io::Error> {
        Err(broken())
    }

    async fn fetched_job_ids(
        &self,
        _queue: &str,
        _from: usize,
        _count: usize,
    ) -> Result<Vec<JobId>, io::Error> {
        Err(broken())
    }

    async fn counts(&self, _queue: &str) -> Result<QueueCounts, io::Error> {
        Err(broken())
    }
}
