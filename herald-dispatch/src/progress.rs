//! Progress aggregation with a single writer.
//!
//! The scheduler owns a [`ProgressTracker`] and is the only code that
//! mutates counters; observers read immutable [`ProgressSnapshot`] values
//! through a watch channel. No count is ever contended, so totals cannot
//! drift under concurrency.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Point-in-time view of a running dispatch.
///
/// Snapshots are immutable once published. `current_batch` is 1-based and
/// stays at zero until the first batch opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Jobs in the dispatch.
    pub total: usize,
    /// Jobs the transport accepted.
    pub completed: usize,
    /// Jobs that failed for good.
    pub failed: usize,
    /// Jobs cancelled before they resolved.
    pub cancelled: usize,
    /// Batch currently being sent (1-based, 0 before the first).
    pub current_batch: usize,
    /// Batches in the dispatch.
    pub total_batches: usize,
    /// Set once on the final snapshot, after every job has resolved.
    pub is_complete: bool,
    /// Jobs resolved per second since the dispatch started.
    pub throughput: f64,
    /// Projected time to finish the remaining jobs at the current rate.
    ///
    /// `None` until a rate exists, and on the final snapshot.
    pub estimated_time_remaining_ms: Option<u64>,
}

impl ProgressSnapshot {
    /// Jobs that have reached a terminal state.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }

    /// Jobs still waiting to resolve.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.total.saturating_sub(self.processed())
    }
}

/// Serialized write-side of progress reporting. Owned by the scheduler
/// task; never cloned, never shared.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: usize,
    total_batches: usize,
    current_batch: usize,
    completed: usize,
    failed: usize,
    cancelled: usize,
    started: Instant,
    tx: watch::Sender<ProgressSnapshot>,
}

impl ProgressTracker {
    pub(crate) fn new(
        total: usize,
        total_batches: usize,
    ) -> (Self, watch::Receiver<ProgressSnapshot>) {
        let (tx, rx) = watch::channel(ProgressSnapshot {
            total,
            completed: 0,
            failed: 0,
            cancelled: 0,
            current_batch: 0,
            total_batches,
            is_complete: false,
            throughput: 0.0,
            estimated_time_remaining_ms: None,
        });

        let tracker = Self {
            total,
            total_batches,
            current_batch: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            started: Instant::now(),
            tx,
        };
        (tracker, rx)
    }

    /// Mark `index` (zero-based) as the batch now being sent.
    pub(crate) fn begin_batch(&mut self, index: usize) {
        self.current_batch = index + 1;
        self.publish(false);
    }

    pub(crate) fn record_success(&mut self) {
        self.completed += 1;
        self.publish(false);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
        self.publish(false);
    }

    pub(crate) fn record_cancelled(&mut self) {
        self.cancelled += 1;
        self.publish(false);
    }

    /// Publish the final snapshot with `is_complete` set.
    pub(crate) fn finalize(&mut self) -> ProgressSnapshot {
        self.publish(true)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) const fn completed(&self) -> usize {
        self.completed
    }

    pub(crate) const fn failed(&self) -> usize {
        self.failed
    }

    pub(crate) const fn cancelled(&self) -> usize {
        self.cancelled
    }

    fn publish(&self, complete: bool) -> ProgressSnapshot {
        let snapshot = self.snapshot(complete);
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn snapshot(&self, complete: bool) -> ProgressSnapshot {
        let processed = self.completed + self.failed + self.cancelled;
        let remaining = self.total.saturating_sub(processed);

        let elapsed_secs = self.started.elapsed().as_secs_f64();
        let throughput = if processed == 0 || elapsed_secs <= 0.0 {
            0.0
        } else {
            processed as f64 / elapsed_secs
        };

        let estimated_time_remaining_ms = (!complete && remaining > 0 && throughput > 0.0)
            .then(|| ((remaining as f64 / throughput) * 1000.0) as u64);

        ProgressSnapshot {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            cancelled: self.cancelled,
            current_batch: self.current_batch,
            total_batches: self.total_batches,
            is_complete: complete,
            throughput,
            estimated_time_remaining_ms,
        }
    }
}
