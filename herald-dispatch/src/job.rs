//! Job model: one unit of work per recipient

use std::sync::Arc;

use herald_common::{MessagePayload, Recipient};
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Lifecycle state of a single job.
///
/// Transitions flow one way: `Pending` to `Sending`, then either a terminal
/// state or `Retrying` and back to `Sending`. The scheduler is the sole
/// writer; everything else observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Queued, not yet handed to the transport.
    Pending,
    /// A transport call is in flight.
    Sending,
    /// A retryable failure occurred; waiting out the backoff delay.
    Retrying { attempts: u32, last_error: String },
    /// The transport accepted the message.
    Succeeded,
    /// Out of retry budget, or a non-retryable failure.
    Failed(String),
    /// Cancelled before completion.
    Cancelled,
}

impl JobStatus {
    /// Returns `true` once the job can never change state again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }
}

/// One queued message for one recipient.
///
/// The payload is shared across every job of a dispatch; jobs never mutate
/// it. `attempt` counts transport calls actually made for this job, so it
/// stays at zero until the first send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Who this message goes to.
    pub recipient: Recipient,
    /// Content shared by the whole dispatch (Arc for cheap cloning).
    pub payload: Arc<MessagePayload>,
    /// Number of transport calls made so far.
    pub attempt: u32,
    /// Retries permitted beyond the first attempt.
    pub max_retries: u32,
    /// Current lifecycle state.
    pub status: JobStatus,
}

impl Job {
    /// Create a new pending job.
    #[must_use]
    pub const fn new(recipient: Recipient, payload: Arc<MessagePayload>, max_retries: u32) -> Self {
        Self {
            recipient,
            payload,
            attempt: 0,
            max_retries,
            status: JobStatus::Pending,
        }
    }

    /// Retries consumed beyond the first attempt.
    #[must_use]
    pub const fn retries_used(&self) -> u32 {
        self.attempt.saturating_sub(1)
    }
}

/// How a job ended, as reported back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    /// The transport accepted the message on attempt `attempts`.
    Delivered { attempts: u32 },
    /// The job failed for good.
    Failed {
        kind: FailureKind,
        reason: String,
        retries: u32,
    },
    /// The job was cancelled before it could resolve.
    Cancelled,
}
