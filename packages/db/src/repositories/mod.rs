//! Repository implementations for database operations.

mod job_repo;
mod queue_entry_repo;

pub use job_repo::JobRepository;
pub use queue_entry_repo::SurrealQueueStore;
