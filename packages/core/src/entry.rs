//! Queue entry records: "job X is waiting in queue Y".

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::JobId;

/// Storage identity of a queue entry, distinct from the job it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub Ulid);

impl EntryId {
    /// Create a new unique entry ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse an entry ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job waiting in a named queue.
///
/// `fetched_at` is the lease timestamp. An entry without one is available;
/// an entry with one stays leased until it is removed, released, or the
/// lease outlives the invisibility window. Expiry is computed at read time,
/// the timestamp itself is never cleared by the passage of time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique identifier for this entry.
    pub id: EntryId,
    /// The job this entry dispatches.
    pub job_id: JobId,
    /// Name of the queue the entry waits in.
    pub queue: String,
    /// When the entry was last leased, if it is leased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token, bumped on every mutation.
    #[serde(default)]
    pub version: u64,
}

impl QueueEntry {
    /// Create a new available entry.
    pub fn new(queue: impl Into<String>, job_id: impl Into<JobId>) -> Self {
        Self {
            id: EntryId::new(),
            job_id: job_id.into(),
            queue: queue.into(),
            fetched_at: None,
            version: 0,
        }
    }

    /// Set the lease timestamp for this entry.
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(fetched_at);
        self
    }

    /// Check if the entry currently carries a lease timestamp.
    pub fn is_leased(&self) -> bool {
        self.fetched_at.is_some()
    }

    /// Check if the entry may be handed out at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>, invisibility_timeout: Duration) -> bool {
        self.is_eligible_before(lease_cutoff(now, invisibility_timeout))
    }

    /// Check eligibility against a precomputed cutoff (see [`lease_cutoff`]).
    pub fn is_eligible_before(&self, cutoff: DateTime<Utc>) -> bool {
        match self.fetched_at {
            None => true,
            Some(fetched_at) => fetched_at < cutoff,
        }
    }
}

/// Leases taken strictly before the returned instant have expired.
pub fn lease_cutoff(now: DateTime<Utc>, invisibility_timeout: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(invisibility_timeout)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
