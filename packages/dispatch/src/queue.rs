//! Enqueue and the polling dequeue loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use queue_core::{
    Clock, JobId, QueueCounts, QueueEntry, QueueError, QueueOptions, QueueStore, SystemClock,
    lease_cutoff,
};
use tokio_util::sync::CancellationToken;

use crate::cancel::cancel_after;
use crate::fetched::FetchedJob;

/// Outcome of one scan over the requested queues.
enum Scan<S: QueueStore> {
    /// Nothing eligible anywhere.
    Empty,
    /// An eligible entry was found but another consumer leased it first.
    Contended,
    Leased(FetchedJob<S>),
}

/// Multi-queue job dispatcher over a shared store.
///
/// Holds no locks: any number of `JobQueue`s, in this process or others, may
/// share one store. Exclusive hand-out relies on the store's conditional
/// lease write. Clones share the same store.
pub struct JobQueue<S: QueueStore> {
    store: Arc<S>,
    options: QueueOptions,
    clock: Arc<dyn Clock>,
}

impl<S: QueueStore> Clone for JobQueue<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            options: self.options.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: QueueStore> JobQueue<S> {
    /// Create a dispatcher over `store`.
    pub fn new(store: S, options: QueueOptions) -> Result<Self, QueueError> {
        Self::from_shared(Arc::new(store), options)
    }

    /// Create a dispatcher over an already shared store.
    pub fn from_shared(store: Arc<S>, options: QueueOptions) -> Result<Self, QueueError> {
        options.validate()?;
        Ok(Self {
            store,
            options,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source used to stamp and age leases.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Put `job_id` on `queue` as an available entry.
    pub async fn enqueue(
        &self,
        queue: &str,
        job_id: impl Into<JobId>,
    ) -> Result<QueueEntry, QueueError> {
        let job_id = job_id.into();
        QueueError::check_queue_name(queue)?;
        QueueError::check_job_id(job_id.as_str())?;

        let entry = self
            .store
            .insert(QueueEntry::new(queue, job_id))
            .await
            .map_err(QueueError::storage)?;

        tracing::debug!("Enqueued job {} on queue '{}'", entry.job_id, entry.queue);
        Ok(entry)
    }

    /// Wait for an eligible entry in `queues` and lease it.
    ///
    /// Earlier queue names win over later ones. When nothing is eligible the
    /// store is polled every `poll_interval` until `cancel` fires, which is
    /// reported as [`QueueError::Canceled`]. Losing a lease race triggers an
    /// immediate rescan.
    pub async fn dequeue<Q>(
        &self,
        queues: &[Q],
        cancel: &CancellationToken,
    ) -> Result<FetchedJob<S>, QueueError>
    where
        Q: AsRef<str> + Sync,
    {
        QueueError::check_queue_names(queues)?;

        loop {
            if cancel.is_cancelled() {
                return Err(QueueError::Canceled);
            }

            match self.scan(queues).await? {
                Scan::Leased(fetched) => return Ok(fetched),
                Scan::Contended => {
                    tracing::trace!("Lost lease race, rescanning");
                }
                Scan::Empty => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(QueueError::Canceled),
                        _ = tokio::time::sleep(self.options.poll_interval()) => {}
                    }
                }
            }
        }
    }

    /// [`dequeue`](Self::dequeue) that gives up after `timeout`.
    pub async fn dequeue_timeout<Q>(
        &self,
        queues: &[Q],
        timeout: Duration,
    ) -> Result<FetchedJob<S>, QueueError>
    where
        Q: AsRef<str> + Sync,
    {
        let cancel = cancel_after(timeout);
        // Stops the timer task once we return.
        let _guard = cancel.clone().drop_guard();
        self.dequeue(queues, &cancel).await
    }

    /// Distinct queue names that currently hold entries.
    pub async fn queue_names(&self) -> Result<Vec<String>, QueueError> {
        self.store.queue_names().await.map_err(QueueError::storage)
    }

    /// Job ids waiting unleased in `queue`, paged.
    pub async fn enqueued_job_ids(
        &self,
        queue: &str,
        from: usize,
        count: usize,
    ) -> Result<Vec<JobId>, QueueError> {
        QueueError::check_queue_name(queue)?;
        self.store
            .enqueued_job_ids(queue, from, count)
            .await
            .map_err(QueueError::storage)
    }

    /// Job ids carrying a lease in `queue`, paged.
    pub async fn fetched_job_ids(
        &self,
        queue: &str,
        from: usize,
        count: usize,
    ) -> Result<Vec<JobId>, QueueError> {
        QueueError::check_queue_name(queue)?;
        self.store
            .fetched_job_ids(queue, from, count)
            .await
            .map_err(QueueError::storage)
    }

    pub async fn counts(&self, queue: &str) -> Result<QueueCounts, QueueError> {
        QueueError::check_queue_name(queue)?;
        self.store.counts(queue).await.map_err(QueueError::storage)
    }

    /// One pass over `queues` in priority order, one query per name.
    async fn scan<Q: AsRef<str> + Sync>(&self, queues: &[Q]) -> Result<Scan<S>, QueueError> {
        let now = self.clock.now();
        let cutoff = lease_cutoff(now, self.options.invisibility_timeout());

        for queue in queues {
            let queue = queue.as_ref();
            let candidate = self
                .store
                .find_eligible_in(queue, cutoff, 1)
                .await
                .map_err(QueueError::storage)?
                .into_iter()
                .next();

            if let Some(candidate) = candidate {
                return self.lease(candidate, now).await;
            }
        }

        tracing::trace!("No eligible entries");
        Ok(Scan::Empty)
    }

    async fn lease(&self, candidate: QueueEntry, now: DateTime<Utc>) -> Result<Scan<S>, QueueError> {
        let expired_lease = candidate.fetched_at;
        let leased = self
            .store
            .try_lease(candidate.id, candidate.version, now)
            .await
            .map_err(QueueError::storage)?;

        let Some(entry) = leased else {
            return Ok(Scan::Contended);
        };

        match expired_lease {
            Some(previous) => tracing::debug!(
                "Re-leased job {} from queue '{}' (previous lease at {} expired)",
                entry.job_id,
                entry.queue,
                previous
            ),
            None => tracing::debug!("Leased job {} from queue '{}'", entry.job_id, entry.queue),
        }

        Ok(Scan::Leased(FetchedJob::new(
            Arc::clone(&self.store),
            entry,
            now,
        )))
    }
}
