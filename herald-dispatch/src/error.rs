//! Typed error handling for dispatch operations.
//!
//! This module provides structured error types that distinguish between:
//! - Validation failures - the dispatch is rejected before any batch runs
//! - Send failures - a single job failed; recorded per recipient
//! - System errors - internal errors in the engine itself

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level dispatch error type.
///
/// This error type provides clear categorization of failures to enable
/// appropriate retry logic and error reporting. A `Validation` or `System`
/// error aborts the whole dispatch; a `Send` error affects one recipient
/// and is captured in the final report rather than propagated.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request was malformed and no work was started.
    #[error("Validation failure: {0}")]
    Validation(#[from] ValidationError),

    /// A single send failed. Carried inside per-recipient failure entries.
    #[error("Send failure: {0}")]
    Send(#[from] SendError),

    /// Engine-level error (state machine violations, task failures, etc.).
    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Validation errors raised before any batch is scheduled.
///
/// When one of these is returned the transport has not been touched and no
/// job exists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The recipient list was empty (or empty after de-duplication).
    #[error("No recipients to dispatch to")]
    NoRecipients,

    /// The payload carries no deliverable content.
    #[error("Payload has no deliverable content")]
    EmptyPayload,

    /// The effective configuration is unusable.
    #[error("Invalid dispatch configuration: {0}")]
    InvalidConfig(String),
}

/// Per-job send errors, classified by where the failure sits.
///
/// Only `Transport` failures are retried with backoff; the other classes
/// cannot succeed on retry and fail the job immediately.
#[derive(Debug, Error)]
pub enum SendError {
    /// Channel or connectivity failure (provider timeout, rate limiting,
    /// gateway errors). Presumed transient.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The recipient is unreachable or rejected (unregistered identity,
    /// blocked sender). Retrying cannot help.
    #[error("Recipient rejected: {0}")]
    Recipient(String),

    /// Per-recipient payload resolution failed before the send.
    #[error("Payload resolution failed: {0}")]
    Payload(String),
}

/// System-level errors that indicate internal problems.
#[derive(Debug, Error)]
pub enum SystemError {
    /// A dispatch is already in flight on this engine.
    #[error("A dispatch is already running")]
    AlreadyRunning,

    /// The recipient source collaborator failed before the dispatch began.
    #[error("Recipient source unavailable: {0}")]
    RecipientSource(String),

    /// The dispatch task ended abnormally.
    #[error("Dispatch task failed: {0}")]
    TaskFailed(String),
}

/// Errors raised by a [`RecipientSource`](crate::source::RecipientSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be reached.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The source was reachable but the query failed.
    #[error("Source query failed: {0}")]
    Query(String),
}

/// Errors raised by a [`PayloadResolver`](crate::source::PayloadResolver).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A template variable had no value for this recipient.
    #[error("Missing template variable: {0}")]
    MissingVariable(String),

    /// Any other resolution failure.
    #[error("Resolution failed: {0}")]
    Failed(String),
}

/// Failure class recorded against a recipient in the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transport,
    Recipient,
    Payload,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Recipient => write!(f, "recipient"),
            Self::Payload => write!(f, "payload"),
        }
    }
}

impl DispatchError {
    /// Returns `true` if this error was raised during request validation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if this error concerns a single send.
    #[must_use]
    pub const fn is_send(&self) -> bool {
        matches!(self, Self::Send(_))
    }

    /// Returns `true` if this is a system error.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }
}

impl SendError {
    /// Returns `true` if this failure may succeed on a later attempt.
    ///
    /// Only transport failures qualify; recipient and payload failures are
    /// final the moment they occur.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The failure class recorded in per-recipient report entries.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Recipient(_) => FailureKind::Recipient,
            Self::Payload(_) => FailureKind::Payload,
        }
    }
}

/// Convert from `SourceError` to `DispatchError`.
///
/// A failing recipient source means the dispatch never started, so the
/// failure lands in the system category rather than the per-send one.
impl From<SourceError> for DispatchError {
    fn from(error: SourceError) -> Self {
        Self::System(SystemError::RecipientSource(error.to_string()))
    }
}

/// Convert from `ResolveError` to `SendError`.
///
/// Resolution is deterministic per recipient, so a failed resolution is a
/// non-retryable payload failure for that job.
impl From<ResolveError> for SendError {
    fn from(error: ResolveError) -> Self {
        Self::Payload(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_is_validation() {
        let error = DispatchError::Validation(ValidationError::NoRecipients);
        assert!(error.is_validation());
        assert!(!error.is_send());
        assert!(!error.is_system());
    }

    #[test]
    fn test_dispatch_error_is_send() {
        let error = DispatchError::Send(SendError::Transport("gateway timeout".to_string()));
        assert!(!error.is_validation());
        assert!(error.is_send());
        assert!(!error.is_system());
    }

    #[test]
    fn test_dispatch_error_is_system() {
        let error = DispatchError::System(SystemError::AlreadyRunning);
        assert!(!error.is_validation());
        assert!(!error.is_send());
        assert!(error.is_system());
    }

    #[test]
    fn test_send_error_retryability() {
        assert!(SendError::Transport("connection reset".to_string()).is_retryable());
        assert!(!SendError::Recipient("not on whatsapp".to_string()).is_retryable());
        assert!(!SendError::Payload("missing variable".to_string()).is_retryable());
    }

    #[test]
    fn test_send_error_kind() {
        assert_eq!(
            SendError::Transport("timeout".to_string()).kind(),
            FailureKind::Transport
        );
        assert_eq!(
            SendError::Recipient("rejected".to_string()).kind(),
            FailureKind::Recipient
        );
        assert_eq!(
            SendError::Payload("bad template".to_string()).kind(),
            FailureKind::Payload
        );
    }

    #[test]
    fn test_error_display() {
        let error = DispatchError::Send(SendError::Transport("gateway timeout".to_string()));
        assert_eq!(
            error.to_string(),
            "Send failure: Transport failure: gateway timeout"
        );

        let error = DispatchError::Validation(ValidationError::EmptyPayload);
        assert_eq!(
            error.to_string(),
            "Validation failure: Payload has no deliverable content"
        );

        let error = DispatchError::System(SystemError::AlreadyRunning);
        assert_eq!(error.to_string(), "System error: A dispatch is already running");
    }

    #[test]
    fn test_source_error_conversion() {
        let source_err = SourceError::Unavailable("segment service down".to_string());
        let dispatch_err: DispatchError = source_err.into();
        assert!(dispatch_err.is_system());
        assert_eq!(
            dispatch_err.to_string(),
            "System error: Recipient source unavailable: Source unavailable: segment service down"
        );
    }

    #[test]
    fn test_resolve_error_conversion() {
        let resolve_err = ResolveError::MissingVariable("first_name".to_string());
        let send_err: SendError = resolve_err.into();
        assert!(!send_err.is_retryable());
        assert_eq!(send_err.kind(), FailureKind::Payload);
        assert_eq!(
            send_err.to_string(),
            "Payload resolution failed: Missing template variable: first_name"
        );
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::Transport.to_string(), "transport");
        assert_eq!(FailureKind::Recipient.to_string(), "recipient");
        assert_eq!(FailureKind::Payload.to_string(), "payload");
    }
}
