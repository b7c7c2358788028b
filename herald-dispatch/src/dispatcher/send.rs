//! Per-job send execution: stagger, resolution, attempts, backoff.

use std::{sync::Arc, time::Duration};

use herald_common::{MessagePayload, outgoing};
use tracing::{info, warn};

use crate::{
    cancel::CancelSignal,
    error::SendError,
    job::{Job, JobStatus, SendOutcome},
    retry::RetryPolicy,
    source::PayloadResolver,
    transport::Transport,
};

/// Everything one sender task needs, cloned per job.
pub(crate) struct SendContext<T> {
    pub(crate) transport: Arc<T>,
    pub(crate) resolver: Option<Arc<dyn PayloadResolver>>,
    pub(crate) policy: RetryPolicy,
    pub(crate) cancel: CancelSignal,
    pub(crate) hard_cancel: bool,
}

impl<T> Clone for SendContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            resolver: self.resolver.clone(),
            policy: self.policy.clone(),
            cancel: self.cancel.clone(),
            hard_cancel: self.hard_cancel,
        }
    }
}

/// Run one job to a terminal state (spawned as a task).
///
/// `stagger` delays the first attempt so the jobs of a batch ramp up
/// instead of firing at once. Cancellation requested during the stagger
/// wait cancels the job before it touches the transport; once sending has
/// begun, only hard cancel interrupts it.
pub(crate) async fn send_job<T: Transport>(
    ctx: SendContext<T>,
    mut job: Job,
    stagger: Duration,
) -> (Job, SendOutcome) {
    if !stagger.is_zero() {
        wait(&ctx, stagger).await;
    }

    if ctx.cancel.is_cancelled() {
        job.status = JobStatus::Cancelled;
        return (job, SendOutcome::Cancelled);
    }

    let outcome = send_with_retry(&ctx, &mut job).await;
    (job, outcome)
}

/// Attempt loop for a single job.
///
/// The payload is resolved once, before the first attempt; retries reuse
/// the result. Only retryable transport failures consume backoff waits,
/// and the budget check runs here rather than in the transport so every
/// job follows one policy.
pub(crate) async fn send_with_retry<T: Transport>(
    ctx: &SendContext<T>,
    job: &mut Job,
) -> SendOutcome {
    let resolved = match resolve_payload(ctx, job).await {
        Ok(resolved) => resolved,
        Err(error) => {
            let reason = error.to_string();
            warn!(
                recipient = %job.recipient.id,
                error = %reason,
                "Payload resolution failed, job will not be attempted"
            );
            job.status = JobStatus::Failed(reason.clone());
            return SendOutcome::Failed {
                kind: error.kind(),
                reason,
                retries: 0,
            };
        }
    };

    let shared = Arc::clone(&job.payload);
    let payload: &MessagePayload = resolved.as_ref().unwrap_or(shared.as_ref());

    loop {
        job.attempt += 1;
        job.status = JobStatus::Sending;
        let attempt = job.attempt;

        outgoing!(level = DEBUG, "Attempt {attempt} for {}", job.recipient.id);

        let result = if ctx.hard_cancel {
            tokio::select! {
                result = ctx.transport.send_one(&job.recipient, payload) => result,
                () = ctx.cancel.cancelled() => {
                    job.status = JobStatus::Cancelled;
                    return SendOutcome::Cancelled;
                }
            }
        } else {
            ctx.transport.send_one(&job.recipient, payload).await
        };

        match result {
            Ok(receipt) => {
                job.status = JobStatus::Succeeded;
                info!(
                    recipient = %job.recipient.id,
                    attempt,
                    provider_message_id = receipt.provider_message_id.as_deref().unwrap_or("-"),
                    "Message delivered"
                );
                return SendOutcome::Delivered { attempts: attempt };
            }

            Err(error) if error.is_retryable() && ctx.policy.should_retry(attempt) => {
                let delay = ctx.policy.backoff_delay(attempt);
                let reason = error.to_string();
                info!(
                    recipient = %job.recipient.id,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %reason,
                    "Transport failure, retrying with backoff"
                );
                job.status = JobStatus::Retrying {
                    attempts: attempt,
                    last_error: reason,
                };

                if ctx.hard_cancel {
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = ctx.cancel.cancelled() => {
                            job.status = JobStatus::Cancelled;
                            return SendOutcome::Cancelled;
                        }
                    }
                } else {
                    tokio::time::sleep(delay).await;
                }
            }

            Err(error) => {
                let reason = error.to_string();
                let retries = job.retries_used();
                warn!(
                    recipient = %job.recipient.id,
                    attempt,
                    kind = %error.kind(),
                    error = %reason,
                    "Job failed permanently"
                );
                job.status = JobStatus::Failed(reason.clone());
                return SendOutcome::Failed {
                    kind: error.kind(),
                    reason,
                    retries,
                };
            }
        }
    }
}

/// Resolve the payload for this job, when a resolver is configured.
///
/// A payload that resolves to empty content can never be delivered, so it
/// fails here rather than bouncing off the transport.
async fn resolve_payload<T>(
    ctx: &SendContext<T>,
    job: &Job,
) -> Result<Option<MessagePayload>, SendError> {
    let Some(resolver) = &ctx.resolver else {
        return Ok(None);
    };

    let resolved = resolver.resolve(&job.recipient, &job.payload).await?;
    if resolved.is_empty() {
        return Err(SendError::Payload(
            "resolved payload has no deliverable content".to_string(),
        ));
    }

    Ok(Some(resolved))
}

async fn wait<T>(ctx: &SendContext<T>, delay: Duration) {
    if ctx.hard_cancel {
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = ctx.cancel.cancelled() => {}
        }
    } else {
        tokio::time::sleep(delay).await;
    }
}
