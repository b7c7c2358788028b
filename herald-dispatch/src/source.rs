//! Collaborator seams for recipient lists and per-recipient payloads.
//!
//! The engine never queries contact storage or renders templates itself.
//! Hosts hand it a [`RecipientSource`] to enumerate an audience and,
//! optionally, a [`PayloadResolver`] to personalise the shared payload per
//! recipient.

use async_trait::async_trait;
use herald_common::{MessagePayload, Recipient};

use crate::error::{ResolveError, SourceError};

/// Supplies the audience for a dispatch.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    /// Enumerate the recipients, in the order they should be sent.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the backing store cannot produce the
    /// list; the dispatch is then never started.
    async fn recipients(&self) -> Result<Vec<Recipient>, SourceError>;
}

/// Produces the payload actually sent to one recipient.
///
/// Resolution must be deterministic per recipient; the engine resolves
/// once per job, before the first attempt, and reuses the result across
/// retries.
#[async_trait]
pub trait PayloadResolver: Send + Sync {
    /// Resolve `base` for `recipient`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when no deliverable payload exists for
    /// this recipient. The job fails without consuming retry budget.
    async fn resolve(
        &self,
        recipient: &Recipient,
        base: &MessagePayload,
    ) -> Result<MessagePayload, ResolveError>;
}

/// In-memory source backed by a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticRecipientSource {
    recipients: Vec<Recipient>,
}

impl StaticRecipientSource {
    #[must_use]
    pub const fn new(recipients: Vec<Recipient>) -> Self {
        Self { recipients }
    }
}

#[async_trait]
impl RecipientSource for StaticRecipientSource {
    async fn recipients(&self) -> Result<Vec<Recipient>, SourceError> {
        Ok(self.recipients.clone())
    }
}

/// Resolver that sends the shared payload untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

#[async_trait]
impl PayloadResolver for IdentityResolver {
    async fn resolve(
        &self,
        _recipient: &Recipient,
        base: &MessagePayload,
    ) -> Result<MessagePayload, ResolveError> {
        Ok(base.clone())
    }
}
