//! Test support utilities for dispatch integration testing
//!
//! Provides a scripted transport whose per-recipient behavior is declared
//! up front, plus a timestamped call log so tests can assert on batch
//! ordering, stagger pacing, and concurrency.

#![allow(dead_code)] // Test utility module - not all helpers used in every test

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use herald_dispatch::{
    MessagePayload, Recipient, RecipientId, SendError, SendReceipt, Transport,
};
use parking_lot::Mutex;

/// What the scripted transport does when a given recipient comes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Accept the message.
    Succeed,
    /// Fail with a transport error this many times, then accept.
    FailTimes(u32),
    /// Fail with a transport error on every attempt.
    AlwaysFail,
    /// Reject the recipient outright (non-retryable).
    Reject,
}

/// One completed transport call.
#[derive(Debug, Clone)]
pub struct SendEvent {
    pub recipient: String,
    /// Body for text payloads, otherwise the payload kind.
    pub content: String,
    pub started: Instant,
    pub finished: Instant,
    pub accepted: bool,
}

/// Transport whose responses follow a per-recipient script.
///
/// Attempts are counted at call entry and events recorded at call exit, so
/// a hard-cancelled send shows up in the attempt counts but not in the
/// event log.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    behaviors: Mutex<HashMap<String, Behavior>>,
    attempts: Mutex<HashMap<String, u32>>,
    events: Mutex<Vec<SendEvent>>,
    latency: Duration,
}

impl ScriptedTransport {
    /// Transport that accepts everything instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a provider round trip of `latency` per call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Script the behavior for one recipient. Unscripted recipients accept.
    #[must_use]
    pub fn script(self, recipient: &str, behavior: Behavior) -> Self {
        self.behaviors
            .lock()
            .insert(recipient.to_string(), behavior);
        self
    }

    /// Completed calls, in completion order.
    pub fn events(&self) -> Vec<SendEvent> {
        self.events.lock().clone()
    }

    /// Number of completed calls.
    pub fn total_calls(&self) -> usize {
        self.events.lock().len()
    }

    /// Calls entered for one recipient, including hard-cancelled ones.
    pub fn attempts_for(&self, recipient: &str) -> u32 {
        self.attempts.lock().get(recipient).copied().unwrap_or(0)
    }

    /// Completed-call events grouped into windows of `batch_size`, in
    /// recipient-index order. Assumes recipients were built by
    /// [`recipients`] so the index is recoverable from the identity.
    pub fn events_by_batch(&self, batch_size: usize) -> Vec<Vec<SendEvent>> {
        let mut grouped: Vec<Vec<SendEvent>> = Vec::new();
        for event in self.events() {
            let index = recipient_index(&event.recipient);
            let batch = index / batch_size;
            if grouped.len() <= batch {
                grouped.resize_with(batch + 1, Vec::new);
            }
            grouped[batch].push(event);
        }
        grouped
    }

    /// Largest number of calls in flight at any instant.
    pub fn max_concurrency(&self) -> usize {
        let events = self.events();
        events
            .iter()
            .map(|event| {
                events
                    .iter()
                    .filter(|other| {
                        other.started < event.finished && event.started < other.finished
                    })
                    .count()
            })
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_one(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<SendReceipt, SendError> {
        let id = recipient.id.to_string();
        let started = Instant::now();
        let attempt = {
            let mut attempts = self.attempts.lock();
            let entry = attempts.entry(id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let behavior = self
            .behaviors
            .lock()
            .get(&id)
            .copied()
            .unwrap_or(Behavior::Succeed);
        let result = match behavior {
            Behavior::Succeed => Ok(SendReceipt::with_id(format!("wamid.{id}.{attempt}"))),
            Behavior::FailTimes(failures) if attempt > failures => {
                Ok(SendReceipt::with_id(format!("wamid.{id}.{attempt}")))
            }
            Behavior::FailTimes(_) | Behavior::AlwaysFail => {
                Err(SendError::Transport("gateway timeout".to_string()))
            }
            Behavior::Reject => Err(SendError::Recipient(
                "identity not registered on channel".to_string(),
            )),
        };

        let content = match payload {
            MessagePayload::Text { body } => body.to_string(),
            other => other.kind().to_string(),
        };
        self.events.lock().push(SendEvent {
            recipient: id,
            content,
            started,
            finished: Instant::now(),
            accepted: result.is_ok(),
        });

        result
    }
}

/// Build `count` recipients with predictable identities `r0`, `r1`, ...
pub fn recipients(count: usize) -> Vec<Recipient> {
    (0..count)
        .map(|index| Recipient::new(recipient_id(index)))
        .collect()
}

/// The identity used for recipient `index` in test audiences.
pub fn recipient_id(index: usize) -> RecipientId {
    RecipientId::new(format!("r{index}")).unwrap()
}

/// Recover the index encoded by [`recipient_id`].
pub fn recipient_index(identity: &str) -> usize {
    identity
        .strip_prefix('r')
        .and_then(|digits| digits.parse().ok())
        .unwrap_or_else(|| panic!("unexpected test recipient identity {identity:?}"))
}
