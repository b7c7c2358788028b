//! Bulk message dispatch engine for WhatsApp-channel campaigns
//!
//! This crate provides functionality to:
//! - Fan one payload out to a recipient list in paced, ordered batches
//! - Pick pacing automatically from the audience size, with host overrides
//! - Retry transient transport failures with capped exponential backoff
//! - Stream live progress snapshots while a dispatch runs
//! - Cancel a running dispatch cooperatively, accounting for every job
//!
//! Everything channel specific stays behind the [`Transport`] trait; the
//! engine itself never talks to a provider.

mod batch;
mod cancel;
mod config;
mod dispatcher;
mod error;
mod job;
mod progress;
mod report;
mod retry;
pub mod source;
pub mod transport;

// Re-export configuration types
pub use config::{ConfigOverrides, DispatchConfig};
// Re-export the engine façade
pub use dispatcher::{DispatchHandle, DispatchState, Dispatcher};
// Re-export error types
pub use error::{
    DispatchError, FailureKind, ResolveError, SendError, SourceError, SystemError, ValidationError,
};
// Re-export common types
pub use herald_common::{MediaRef, MessagePayload, Recipient, RecipientId, RecipientIdError};
// Re-export job and batch types
pub use batch::Batch;
pub use job::{Job, JobStatus};
// Re-export progress and report types
pub use progress::ProgressSnapshot;
pub use report::{DispatchFailure, DispatchId, DispatchResult};
// Re-export retry policy
pub use retry::RetryPolicy;
// Re-export collaborator seams
pub use source::{IdentityResolver, PayloadResolver, RecipientSource, StaticRecipientSource};
pub use transport::{DryRunTransport, SendReceipt, Transport};
