//! Cooperative cancellation for a running dispatch.
//!
//! Cancellation is a request, not an interrupt: the scheduler observes the
//! signal at batch boundaries and before each job start, and jobs already
//! in flight run to completion unless hard cancel is configured.

use tokio_util::sync::CancellationToken;

/// Cheap-to-clone cancellation signal shared by the scheduler, its handle,
/// and every sender task.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Idempotent; later calls are no-ops.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
