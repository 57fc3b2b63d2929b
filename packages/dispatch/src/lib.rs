//! Dequeue engine for the job dispatch queue.
//!
//! This crate hands waiting queue entries to consumers, one entry per
//! consumer, on top of any [`QueueStore`](queue_core::QueueStore).
//!
//! # Architecture
//!
//! - `JobQueue` - Enqueues entries and leases them out in queue-name priority order
//! - `FetchedJob` - Handle for one leased entry until it is removed or requeued
//! - `cancel_after` - Deadline-driven cancellation for bounded waits
//!
//! # Usage
//!
//! ```ignore
//! use dispatch::{JobQueue, cancel_after};
//! use queue_core::{InMemoryQueueStore, QueueOptions};
//!
//! let queue = JobQueue::new(InMemoryQueueStore::new(), QueueOptions::default())?;
//! queue.enqueue("default", "job-1").await?;
//!
//! let fetched = queue.dequeue(&["critical", "default"], &cancel_after(timeout)).await?;
//! run(fetched.job_id()).await;
//! fetched.remove_from_queue().await?;
//! ```

mod cancel;
mod fetched;
mod queue;

pub use cancel::cancel_after;
pub use fetched::FetchedJob;
pub use queue::JobQueue;

/// Re-export the cancellation token type for convenience.
pub use tokio_util::sync::CancellationToken;
