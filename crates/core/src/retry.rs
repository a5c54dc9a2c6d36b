//! Retry policy and the queue of events awaiting another attempt.

use dashmap::DashMap;
use relayer_chain::{BridgeEvent, FailureKind};
use std::time::Duration;

use crate::config::RelayConfig;

/// Bounded attempts with linear backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Backoff unit for transient failures.
    pub base_backoff: Duration,
    /// Backoff unit after a replacement was rejected for its fee.
    pub fee_too_low_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_backoff: config.retry_backoff(),
            fee_too_low_backoff: config.fee_too_low_backoff(),
        }
    }

    /// Sleep after failed attempt number `attempt` (1-based), by failure shape.
    pub fn backoff(&self, kind: FailureKind, attempt: u32) -> Duration {
        match kind {
            FailureKind::FeeTooLow => self.fee_too_low_backoff * attempt,
            _ => self.linear_backoff(attempt),
        }
    }

    /// `base_backoff * attempt`, whatever the failure.
    pub fn linear_backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * attempt
    }
}

/// Locked/Burned events whose processing failed, per chain.
///
/// The watermark moves past failed events, so they are kept here and tried
/// again at the start of the chain's next poll.
#[derive(Debug, Default)]
pub struct RetryQueue {
    inner: DashMap<u64, Vec<BridgeEvent>>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event; an event already queued is not added twice.
    pub fn push(&self, chain_id: u64, event: BridgeEvent) {
        let mut queue = self.inner.entry(chain_id).or_default();
        let key = event.dedup_key();
        if !queue.iter().any(|e| e.dedup_key() == key) {
            queue.push(event);
        }
    }

    /// Remove and return the chain's queued events, oldest first.
    pub fn take(&self, chain_id: u64) -> Vec<BridgeEvent> {
        let mut events = self
            .inner
            .remove(&chain_id)
            .map(|(_, events)| events)
            .unwrap_or_default();
        events.sort_by_key(|e| (e.block_timestamp, e.block_number));
        events
    }

    pub fn len(&self, chain_id: u64) -> usize {
        self.inner.get(&chain_id).map(|q| q.len()).unwrap_or(0)
    }
}
