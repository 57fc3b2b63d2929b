//! Errors surfaced by queue operations.

use crate::EntryId;

/// Queue errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// A required argument was empty or otherwise unusable.
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument {
        name: &'static str,
        reason: &'static str,
    },

    /// The cancellation signal fired before a job could be fetched.
    #[error("Operation was canceled")]
    Canceled,

    /// The lease behind a fetched job expired and was taken by another consumer.
    #[error("Lease on queue entry {0} was lost")]
    LeaseLost(EntryId),

    /// The underlying store failed. The store's own error is the source.
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl QueueError {
    pub(crate) fn invalid(name: &'static str, reason: &'static str) -> Self {
        Self::InvalidArgument { name, reason }
    }

    /// Wrap a store error.
    pub fn storage<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(error))
    }

    /// Check if this is the expected "nothing arrived in time" outcome.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Validate a single queue name.
    pub fn check_queue_name(queue: &str) -> Result<(), Self> {
        if queue.is_empty() {
            return Err(Self::invalid("queue", "queue name must not be empty"));
        }
        Ok(())
    }

    /// Validate a job identifier.
    pub fn check_job_id(job_id: &str) -> Result<(), Self> {
        if job_id.is_empty() {
            return Err(Self::invalid("job_id", "job id must not be empty"));
        }
        Ok(())
    }

    /// Validate a priority-ordered list of queue names.
    pub fn check_queue_names<Q: AsRef<str>>(queues: &[Q]) -> Result<(), Self> {
        if queues.is_empty() {
            return Err(Self::invalid("queues", "at least one queue name is required"));
        }
        if queues.iter().any(|q| q.as_ref().is_empty()) {
            return Err(Self::invalid("queues", "queue names must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_list_is_rejected() {
        let queues: [&str; 0] = [];
        let err = QueueError::check_queue_names(&queues).unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument { name: "queues", .. }));
    }

    #[test]
    fn blank_member_is_rejected() {
        let err = QueueError::check_queue_names(&["critical", ""]).unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument { name: "queues", .. }));
    }

    #[test]
    fn storage_error_keeps_source() {
        use std::error::Error;

        let io = std::io::Error::other("disk gone");
        let err = QueueError::storage(io);
        let source = err.source().and_then(|s| s.downcast_ref::<std::io::Error>());
        assert!(source.is_some());
    }
}
