//! Core domain types for the job dispatch queue.
//!
//! This crate contains the types shared by the store implementations and the
//! dequeue engine:
//! - QueueEntry and EntryId for "job X is waiting in queue Y" records
//! - Job and JobId for the job records entries point at
//! - The QueueStore trait every durable backend implements
//! - QueueOptions and QueueError for configuration and failures

mod clock;
mod entry;
mod error;
mod job;
mod options;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use entry::{EntryId, QueueEntry, lease_cutoff};
pub use error::QueueError;
pub use job::{Job, JobId};
pub use options::QueueOptions;
pub use store::{InMemoryQueueStore, QueueCounts, QueueStore};
