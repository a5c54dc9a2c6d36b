//! Bridge event model shared by the feed and log sources.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of bridge event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Token locked on its home chain, to be minted on the target.
    Locked,
    /// Wrapped token burned, to be minted back on the target.
    Burned,
    Minted,
    Unlocked,
}

impl EventKind {
    /// Lowercase name used in dedup keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Locked => "locked",
            EventKind::Burned => "burned",
            EventKind::Minted => "minted",
            EventKind::Unlocked => "unlocked",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bridge event observed on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEvent {
    /// Unique id, assigned by the indexer or `{txHash}-{logIndex}` for logs.
    pub id: String,
    pub kind: EventKind,
    pub token_address: Address,
    pub token_id: U256,
    /// Owner for Locked/Burned, recipient for Minted/Unlocked.
    pub user_address: Address,
    /// Target chain for Locked/Burned, source chain for Minted/Unlocked.
    pub counterpart_chain_id: u64,
    /// Recipient on the target chain (Locked/Burned only).
    pub counterpart_address: Option<Address>,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: B256,
}

impl BridgeEvent {
    /// Key under which the processed state of this event is recorded.
    pub fn dedup_key(&self) -> String {
        format!("{}_{}", self.kind, self.id)
    }
}

/// Events of one fetch, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub locked: Vec<BridgeEvent>,
    pub burned: Vec<BridgeEvent>,
    pub minted: Vec<BridgeEvent>,
    pub unlocked: Vec<BridgeEvent>,
}

impl EventBatch {
    pub fn push(&mut self, event: BridgeEvent) {
        match event.kind {
            EventKind::Locked => self.locked.push(event),
            EventKind::Burned => self.burned.push(event),
            EventKind::Minted => self.minted.push(event),
            EventKind::Unlocked => self.unlocked.push(event),
        }
    }

    pub fn len(&self) -> usize {
        self.locked.len() + self.burned.len() + self.minted.len() + self.unlocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest block timestamp across all kinds.
    pub fn max_timestamp(&self) -> Option<u64> {
        self.iter().map(|e| e.block_timestamp).max()
    }

    /// Timestamp a poll may resume after without skipping events.
    ///
    /// A kind that filled its page (`limit` events) may have more events past
    /// its last kept one, so the result stays below that timestamp and the
    /// boundary events are fetched again. A page that never gets past `since`
    /// that way resumes at its last timestamp instead.
    pub fn resume_timestamp(&self, since: u64, limit: usize) -> Option<u64> {
        let mut resume = self.max_timestamp()?;
        for list in [&self.locked, &self.burned, &self.minted, &self.unlocked] {
            if limit == 0 || list.len() < limit {
                continue;
            }
            if let Some(last) = list.last() {
                let before_last = last.block_timestamp.saturating_sub(1);
                let bound = if before_last > since {
                    before_last
                } else {
                    last.block_timestamp
                };
                resume = resume.min(bound);
            }
        }
        Some(resume)
    }

    /// Locked and Burned events merged in ascending block order.
    pub fn into_relayable(self) -> Vec<BridgeEvent> {
        let mut events: Vec<BridgeEvent> = self.locked.into_iter().chain(self.burned).collect();
        events.sort_by_key(|e| (e.block_timestamp, e.block_number));
        events
    }

    pub fn iter(&self) -> impl Iterator<Item = &BridgeEvent> {
        self.locked
            .iter()
            .chain(&self.burned)
            .chain(&self.minted)
            .chain(&self.unlocked)
    }

    /// Keep events newer than `since`, sort ascending and cap each kind.
    pub fn window(mut self, since: u64, limit: usize) -> Self {
        for list in [
            &mut self.locked,
            &mut self.burned,
            &mut self.minted,
            &mut self.unlocked,
        ] {
            list.retain(|e| e.block_timestamp > since);
            list.sort_by_key(|e| (e.block_timestamp, e.block_number));
            list.truncate(limit);
        }
        self
    }
}
