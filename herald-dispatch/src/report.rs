//! Final report types for a finished dispatch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use herald_common::RecipientId;
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Identifier for a dispatch
///
/// A ULID: globally unique, lexicographically sortable by start time,
/// collision-resistant. Hosts use it to correlate progress streams, final
/// reports, and log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchId {
    id: ulid::Ulid,
}

impl DispatchId {
    /// Create a dispatch ID from an existing ULID
    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    /// Generate a new unique dispatch ID
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    /// Get the underlying ULID
    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }

    /// Get the timestamp (milliseconds since Unix epoch) encoded in this ULID
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl serde::Serialize for DispatchId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for DispatchId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self { id })
    }
}

/// One failed recipient in the final report.
///
/// Only genuine failures appear here; cancelled jobs are counted but not
/// listed, since nothing was wrong with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFailure {
    /// Identity the send was addressed to.
    pub recipient_id: RecipientId,
    /// Display name, when the recipient had one.
    pub display_name: Option<Arc<str>>,
    /// Failure class, for grouping in host UIs.
    pub kind: FailureKind,
    /// Human-readable reason from the last attempt.
    pub reason: String,
    /// Retries consumed beyond the first attempt.
    pub retry_count: u32,
}

/// Immutable summary of a finished dispatch.
///
/// `total` always equals `successful + failed + cancelled`: every job is
/// accounted for exactly once, whatever happened along the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub dispatch_id: DispatchId,
    /// Jobs created for this dispatch (after de-duplication).
    pub total: usize,
    /// Jobs the transport accepted.
    pub successful: usize,
    /// Jobs that failed for good.
    pub failed: usize,
    /// Jobs cancelled before they resolved.
    pub cancelled: usize,
    /// Per-recipient detail for every failed job.
    pub errors: Vec<DispatchFailure>,
    /// Wall-clock instant the dispatch began.
    pub started_at: DateTime<Utc>,
    /// Wall-clock instant the last job resolved.
    pub finished_at: DateTime<Utc>,
    /// Total run time in milliseconds.
    pub duration_ms: u64,
    /// Jobs resolved per second over the whole run.
    pub throughput: f64,
    /// Whether cancellation was requested at any point.
    pub was_cancelled: bool,
}

impl DispatchResult {
    /// Jobs accounted for across all terminal states.
    #[must_use]
    pub const fn accounted(&self) -> usize {
        self.successful + self.failed + self.cancelled
    }

    /// Whether every job was delivered.
    #[must_use]
    pub const fn all_delivered(&self) -> bool {
        self.successful == self.total
    }
}
