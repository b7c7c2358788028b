//! Transport seam: the single point where messages leave the engine.
//!
//! The engine never talks to a provider directly. Everything channel
//! specific (API clients, session pools, media upload quirks) lives behind
//! [`Transport`], which keeps the scheduler testable against scripted
//! implementations.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use herald_common::{MessagePayload, Recipient};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SendError;

/// Provider acknowledgement for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider-side message id, when the channel issues one.
    pub provider_message_id: Option<Arc<str>>,
}

impl SendReceipt {
    /// Receipt without a provider id.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            provider_message_id: None,
        }
    }

    /// Receipt carrying the provider's message id.
    #[must_use]
    pub fn with_id(id: impl Into<Arc<str>>) -> Self {
        Self {
            provider_message_id: Some(id.into()),
        }
    }
}

/// A channel capable of delivering one message to one recipient.
///
/// Implementations map provider failures onto [`SendError`] classes; the
/// engine derives all retry behavior from that classification alone.
/// Implementations must be safe to call concurrently up to the configured
/// batch size.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `payload` to `recipient` and wait for the provider verdict.
    ///
    /// # Errors
    ///
    /// - [`SendError::Transport`] for transient channel failures worth
    ///   retrying (timeouts, rate limiting, gateway errors)
    /// - [`SendError::Recipient`] when the recipient is unreachable or has
    ///   rejected the sender
    /// - [`SendError::Payload`] when the content itself cannot be delivered
    async fn send_one(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<SendReceipt, SendError>;
}

/// Transport that accepts everything without touching a provider.
///
/// Useful for rehearsing a campaign: pacing, batching, retries, and
/// progress all behave exactly as in production while nothing leaves the
/// process. An optional synthetic latency stands in for provider round
/// trips.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    latency: Option<Duration>,
    sent: AtomicUsize,
}

impl DryRunTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a provider round trip of `latency` per send.
    #[must_use]
    pub const fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            sent: AtomicUsize::new(0),
        }
    }

    /// Number of sends accepted so far.
    #[must_use]
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for DryRunTransport {
    async fn send_one(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<SendReceipt, SendError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            recipient = %recipient.id,
            kind = payload.kind(),
            "Dry-run send accepted"
        );

        Ok(SendReceipt::empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use herald_common::RecipientId;

    use super::*;

    #[tokio::test]
    async fn test_dry_run_accepts_and_counts() {
        let transport = DryRunTransport::new();
        let recipient = Recipient::new(RecipientId::new("27115550100").unwrap());
        let payload = MessagePayload::text("hello");

        let receipt = transport.send_one(&recipient, &payload).await.unwrap();
        assert_eq!(receipt, SendReceipt::empty());

        transport.send_one(&recipient, &payload).await.unwrap();
        assert_eq!(transport.sent(), 2);
    }

    #[test]
    fn test_receipt_with_id() {
        let receipt = SendReceipt::with_id("wamid.123");
        assert_eq!(receipt.provider_message_id.as_deref(), Some("wamid.123"));
    }
}
