//! Iterative batch loop: one batch at a time, strictly ordered.
//!
//! The loop owns the progress tracker and the failure list; sender tasks
//! report outcomes through the join set and never share mutable state.
//! Batch `i + 1` cannot open before every job of batch `i` has resolved.

use std::{sync::Arc, time::Duration};

use ahash::AHashMap;
use chrono::Utc;
use herald_common::RecipientId;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::{
    batch::Batch,
    cancel::CancelSignal,
    config::DispatchConfig,
    dispatcher::send::{SendContext, send_job},
    error::FailureKind,
    job::{Job, SendOutcome},
    progress::ProgressTracker,
    report::{DispatchFailure, DispatchId, DispatchResult},
    retry::RetryPolicy,
    source::PayloadResolver,
    transport::Transport,
};

/// Immutable inputs of one dispatch run.
pub(crate) struct RunContext<T> {
    pub(crate) dispatch_id: DispatchId,
    pub(crate) transport: Arc<T>,
    pub(crate) resolver: Option<Arc<dyn PayloadResolver>>,
    pub(crate) config: DispatchConfig,
    pub(crate) cancel: CancelSignal,
}

/// Drive every batch to completion and assemble the final report.
///
/// Runs inside the dispatch task; this function is the single writer of
/// the tracker for the whole dispatch.
pub(crate) async fn run_dispatch<T: Transport + 'static>(
    ctx: RunContext<T>,
    batches: Vec<Batch>,
    mut tracker: ProgressTracker,
) -> DispatchResult {
    let started_at = Utc::now();
    let total_batches = batches.len();
    let total: usize = batches.iter().map(Batch::len).sum();
    let policy = ctx.config.retry_policy();
    let mut failures: Vec<DispatchFailure> = Vec::new();

    info!(
        dispatch_id = %ctx.dispatch_id,
        total,
        total_batches,
        batch_size = ctx.config.batch_size,
        "Dispatch starting"
    );

    let mut remaining = batches.into_iter();
    let mut stopped_early = false;

    while let Some(batch) = remaining.next() {
        // Boundary check: a cancel request stops everything not yet started
        if ctx.cancel.is_cancelled() {
            cancel_unstarted(&batch, &mut remaining, &mut tracker);
            stopped_early = true;
            break;
        }

        let batch_index = batch.index;
        tracker.begin_batch(batch_index);
        debug!(
            dispatch_id = %ctx.dispatch_id,
            batch = batch_index + 1,
            jobs = batch.len(),
            "Batch starting"
        );

        run_batch(&ctx, &policy, batch, &mut tracker, &mut failures).await;

        let is_last = batch_index + 1 == total_batches;
        if !is_last && !ctx.cancel.is_cancelled() {
            // The pause races cancellation so a cancelled dispatch ends now
            // instead of after a full inter-batch delay
            tokio::select! {
                () = tokio::time::sleep(ctx.config.delay_between_batches()) => {}
                () = ctx.cancel.cancelled() => {}
            }
        }
    }

    let was_cancelled = stopped_early || ctx.cancel.is_cancelled();
    let last = tracker.finalize();
    let finished_at = Utc::now();

    let result = DispatchResult {
        dispatch_id: ctx.dispatch_id.clone(),
        total,
        successful: tracker.completed(),
        failed: tracker.failed(),
        cancelled: tracker.cancelled(),
        errors: failures,
        started_at,
        finished_at,
        duration_ms: u64::try_from(tracker.elapsed().as_millis()).unwrap_or(u64::MAX),
        throughput: last.throughput,
        was_cancelled,
    };

    info!(
        dispatch_id = %ctx.dispatch_id,
        successful = result.successful,
        failed = result.failed,
        cancelled = result.cancelled,
        duration_ms = result.duration_ms,
        was_cancelled = result.was_cancelled,
        "Dispatch finished"
    );

    result
}

/// Send one batch: spawn every job with its stagger offset, then drain the
/// join set until the batch has fully resolved.
async fn run_batch<T: Transport + 'static>(
    ctx: &RunContext<T>,
    policy: &RetryPolicy,
    batch: Batch,
    tracker: &mut ProgressTracker,
    failures: &mut Vec<DispatchFailure>,
) {
    let mut join_set: JoinSet<(Job, SendOutcome)> = JoinSet::new();
    // Recipient identity per task, so accounting stays exact even if a
    // sender task dies
    let mut in_flight: AHashMap<tokio::task::Id, (RecipientId, Option<Arc<str>>)> =
        AHashMap::with_capacity(batch.len());

    for (position, job) in batch.jobs.into_iter().enumerate() {
        let send_ctx = SendContext {
            transport: Arc::clone(&ctx.transport),
            resolver: ctx.resolver.clone(),
            policy: policy.clone(),
            cancel: ctx.cancel.clone(),
            hard_cancel: ctx.config.hard_cancel,
        };
        let stagger = Duration::from_millis(
            ctx.config
                .delay_between_messages_ms
                .saturating_mul(u64::try_from(position).unwrap_or(u64::MAX)),
        );

        let identity = (job.recipient.id.clone(), job.recipient.display_name.clone());
        let handle = join_set.spawn(send_job(send_ctx, job, stagger));
        in_flight.insert(handle.id(), identity);
    }

    while let Some(joined) = join_set.join_next_with_id().await {
        match joined {
            Ok((task_id, (job, outcome))) => {
                in_flight.remove(&task_id);
                settle(job, outcome, tracker, failures);
            }
            Err(join_error) => {
                // A sender task panicked or was aborted; its job still has
                // to land in the totals
                error!(error = %join_error, "Sender task failed");
                if let Some((recipient_id, display_name)) = in_flight.remove(&join_error.id()) {
                    tracker.record_failure();
                    failures.push(DispatchFailure {
                        recipient_id,
                        display_name,
                        kind: FailureKind::Transport,
                        reason: format!("sender task failed: {join_error}"),
                        retry_count: 0,
                    });
                }
            }
        }
    }
}

fn settle(
    job: Job,
    outcome: SendOutcome,
    tracker: &mut ProgressTracker,
    failures: &mut Vec<DispatchFailure>,
) {
    match outcome {
        SendOutcome::Delivered { .. } => tracker.record_success(),
        SendOutcome::Cancelled => tracker.record_cancelled(),
        SendOutcome::Failed {
            kind,
            reason,
            retries,
        } => {
            tracker.record_failure();
            failures.push(DispatchFailure {
                recipient_id: job.recipient.id,
                display_name: job.recipient.display_name,
                kind,
                reason,
                retry_count: retries,
            });
        }
    }
}

/// Mark the current batch and everything after it as cancelled without
/// starting any of it.
fn cancel_unstarted(
    current: &Batch,
    rest: &mut std::vec::IntoIter<Batch>,
    tracker: &mut ProgressTracker,
) {
    let skipped = current.len() + rest.by_ref().map(|batch| batch.len()).sum::<usize>();
    for _ in 0..skipped {
        tracker.record_cancelled();
    }

    info!(
        skipped,
        "Cancellation observed at batch boundary, unstarted jobs cancelled"
    );
}
