//! Dispatch orchestration: validation, lifecycle, and the public façade.

pub(crate) mod run;
pub(crate) mod send;

use std::sync::Arc;

use ahash::AHashSet;
use herald_common::{MessagePayload, Recipient, internal};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tracing::warn;

use crate::{
    batch,
    cancel::CancelSignal,
    config::{ConfigOverrides, DispatchConfig},
    error::{DispatchError, SystemError, ValidationError},
    job::Job,
    progress::{ProgressSnapshot, ProgressTracker},
    report::{DispatchId, DispatchResult},
    source::{PayloadResolver, RecipientSource},
    transport::Transport,
};

use run::{RunContext, run_dispatch};

/// Lifecycle of the engine's single dispatch slot.
///
/// `Completed` and `Cancelled` describe the most recent dispatch; either
/// way the slot is free and `start` may be called again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    /// No dispatch has run yet.
    Idle,
    /// A dispatch is in flight.
    Running,
    /// The last dispatch ran every job to a terminal state.
    Completed,
    /// The last dispatch was cancelled before finishing.
    Cancelled,
}

#[derive(Debug)]
struct ActiveSlot {
    state: DispatchState,
    cancel: Option<CancelSignal>,
}

/// Bulk dispatch engine: one dispatch at a time, paced and supervised.
///
/// The dispatcher owns nothing channel specific; it drives a [`Transport`]
/// through batches, staggers, retries, and progress reporting. Cloning is
/// cheap and clones share the single dispatch slot.
pub struct Dispatcher<T: Transport + 'static> {
    transport: Arc<T>,
    resolver: Option<Arc<dyn PayloadResolver>>,
    overrides: ConfigOverrides,
    slot: Arc<Mutex<ActiveSlot>>,
}

impl<T: Transport + 'static> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            resolver: self.resolver.clone(),
            overrides: self.overrides.clone(),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Transport + 'static> Dispatcher<T> {
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            resolver: None,
            overrides: ConfigOverrides::default(),
            slot: Arc::new(Mutex::new(ActiveSlot {
                state: DispatchState::Idle,
                cancel: None,
            })),
        }
    }

    /// Personalise payloads through `resolver` before each job's first
    /// attempt.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PayloadResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Engine-wide configuration overrides, applied beneath any
    /// per-dispatch overrides passed to [`start`](Self::start).
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Current lifecycle state of the dispatch slot.
    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.slot.lock().state
    }

    /// Pacing this engine would use for an audience of `recipient_count`.
    ///
    /// Deterministic for a given engine: the tier table decides, then the
    /// engine-wide overrides are layered on. Hosts call this to preview a
    /// dispatch before committing to it.
    #[must_use]
    pub fn suggest_config(&self, recipient_count: usize) -> DispatchConfig {
        self.overrides.apply(DispatchConfig::suggest(recipient_count))
    }

    /// Start dispatching `payload` to `recipients`.
    ///
    /// Duplicate identities are dropped (first occurrence wins) before
    /// validation. On success the dispatch runs in a background task and
    /// the returned [`DispatchHandle`] observes it; the engine stays
    /// `Running` until every job resolves.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NoRecipients`] if the list is empty after
    ///   de-duplication
    /// - [`ValidationError::EmptyPayload`] if the payload has no content
    /// - [`ValidationError::InvalidConfig`] if the effective configuration
    ///   is unusable
    /// - [`SystemError::AlreadyRunning`] if a dispatch is in flight
    ///
    /// No recipient is contacted when any of these is returned.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(
        &self,
        recipients: Vec<Recipient>,
        payload: MessagePayload,
        overrides: Option<ConfigOverrides>,
    ) -> Result<DispatchHandle, DispatchError> {
        let recipients = dedup_recipients(recipients);
        if recipients.is_empty() {
            return Err(ValidationError::NoRecipients.into());
        }
        if payload.is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }

        let merged = match &overrides {
            Some(per_dispatch) => self.overrides.merged(per_dispatch),
            None => self.overrides.clone(),
        };
        let config = DispatchConfig::resolve(recipients.len(), &merged)?;

        let dispatch_id = DispatchId::generate();
        let payload = Arc::new(payload);
        let jobs: Vec<Job> = recipients
            .into_iter()
            .map(|recipient| Job::new(recipient, Arc::clone(&payload), config.max_retries))
            .collect();
        let total = jobs.len();
        let batches = batch::partition(jobs, config.batch_size);
        let (tracker, progress) = ProgressTracker::new(total, batches.len());
        let cancel = CancelSignal::new();

        // Claim the slot last so validation failures leave state untouched
        {
            let mut slot = self.slot.lock();
            if slot.state == DispatchState::Running {
                return Err(SystemError::AlreadyRunning.into());
            }
            slot.state = DispatchState::Running;
            slot.cancel = Some(cancel.clone());
        }

        internal!(
            level = INFO,
            "Dispatch {dispatch_id} accepted: {total} jobs in {} batches",
            batches.len()
        );

        let ctx = RunContext {
            dispatch_id: dispatch_id.clone(),
            transport: Arc::clone(&self.transport),
            resolver: self.resolver.clone(),
            config,
            cancel: cancel.clone(),
        };
        let slot = Arc::clone(&self.slot);
        let task = tokio::spawn(async move {
            let result = run_dispatch(ctx, batches, tracker).await;

            let mut slot = slot.lock();
            slot.state = if result.was_cancelled {
                DispatchState::Cancelled
            } else {
                DispatchState::Completed
            };
            slot.cancel = None;

            result
        });

        Ok(DispatchHandle {
            dispatch_id,
            progress,
            cancel,
            task,
        })
    }

    /// Start a dispatch with the audience drawn from `source`.
    ///
    /// # Errors
    ///
    /// As [`start`](Self::start), plus [`SystemError::RecipientSource`]
    /// when the source fails; the dispatch is then never started.
    pub async fn start_from_source(
        &self,
        source: &dyn RecipientSource,
        payload: MessagePayload,
        overrides: Option<ConfigOverrides>,
    ) -> Result<DispatchHandle, DispatchError> {
        let recipients = source.recipients().await?;
        self.start(recipients, payload, overrides)
    }

    /// Request cancellation of the running dispatch.
    ///
    /// Cooperative: jobs already talking to the transport finish (unless
    /// hard cancel is configured) and everything not yet started is
    /// cancelled. Returns `true` if a running dispatch observed the
    /// request, `false` when nothing was running.
    pub fn cancel(&self) -> bool {
        let slot = self.slot.lock();
        if slot.state == DispatchState::Running
            && let Some(cancel) = &slot.cancel
        {
            internal!(level = INFO, "Cancellation requested");
            cancel.cancel();
            true
        } else {
            false
        }
    }
}

/// Live view of one dispatch: progress stream, cancellation, and the
/// final report.
#[derive(Debug)]
pub struct DispatchHandle {
    dispatch_id: DispatchId,
    progress: watch::Receiver<ProgressSnapshot>,
    cancel: CancelSignal,
    task: JoinHandle<DispatchResult>,
}

impl DispatchHandle {
    /// Identifier of this dispatch.
    #[must_use]
    pub const fn dispatch_id(&self) -> &DispatchId {
        &self.dispatch_id
    }

    /// Subscribe to progress snapshots.
    ///
    /// A watch receiver always holds the latest snapshot; slow readers see
    /// the freshest state rather than a backlog.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.clone()
    }

    /// The latest progress snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress.borrow().clone()
    }

    /// Request cancellation of this dispatch. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the dispatch to finish and take the final report.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::TaskFailed`] if the dispatch task panicked
    /// or was aborted.
    pub async fn wait(self) -> Result<DispatchResult, DispatchError> {
        self.task
            .await
            .map_err(|error| DispatchError::from(SystemError::TaskFailed(error.to_string())))
    }
}

/// Drop duplicate identities, keeping the first occurrence of each in its
/// original position.
fn dedup_recipients(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen = AHashSet::with_capacity(recipients.len());
    let mut unique = Vec::with_capacity(recipients.len());
    let mut dropped = 0usize;

    for recipient in recipients {
        if seen.insert(recipient.id.clone()) {
            unique.push(recipient);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        warn!(dropped, "Duplicate recipients removed from dispatch");
    }

    unique
}
