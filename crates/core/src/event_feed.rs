//! Bridge event source with indexer and chain-log backends.
//!
//! The indexer is preferred: one request returns every event kind newer than
//! the watermark. Chains without an indexer, or whose indexer request fails,
//! fall back to scanning bridge logs from a per-chain block cursor.

use alloy::primitives::{Address, B256, U256};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use relayer_api::{EventFeedClient, FeedEvent, FeedEvents, PAGE_SIZE};
use relayer_chain::{BridgeEvent, ChainClient, EventBatch, EventKind, LogEventFetcher};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use crate::config::ChainConfig;
use crate::registry::ChainRegistry;

/// Source of bridge events for a chain.
#[async_trait]
pub trait EventSource: Send + Sync + std::fmt::Debug {
    /// Events with `block_timestamp > since`, ascending, at most 100 per kind.
    async fn fetch_events(&self, chain: &ChainConfig, since: u64) -> Result<EventBatch>;
}

/// Convert one indexer record.
pub fn convert_feed_event(kind: EventKind, record: &FeedEvent) -> Result<BridgeEvent> {
    let token_address: Address = record
        .token_address
        .parse()
        .with_context(|| format!("tokenAddress {:?}", record.token_address))?;
    let token_id: U256 = record
        .token_id
        .parse()
        .with_context(|| format!("tokenId {:?}", record.token_id))?;
    let block_number: u64 = record
        .block_number
        .parse()
        .with_context(|| format!("blockNumber {:?}", record.block_number))?;
    let block_timestamp: u64 = record
        .block_timestamp
        .parse()
        .with_context(|| format!("blockTimestamp {:?}", record.block_timestamp))?;
    let transaction_hash: B256 = record
        .transaction_hash
        .parse()
        .with_context(|| format!("transactionHash {:?}", record.transaction_hash))?;

    let (user, counterpart_chain, counterpart_address) = match kind {
        EventKind::Locked | EventKind::Burned => (
            record.owner.as_deref(),
            record.target_chain_id.as_deref(),
            match record.target_address.as_deref() {
                Some(addr) => Some(
                    addr.parse::<Address>()
                        .with_context(|| format!("targetAddress {addr:?}"))?,
                ),
                None => return Err(anyhow!("missing targetAddress")),
            },
        ),
        EventKind::Minted | EventKind::Unlocked => (
            record.recipient.as_deref(),
            record.source_chain_id.as_deref(),
            None,
        ),
    };

    let user_address: Address = user
        .ok_or_else(|| anyhow!("missing owner/recipient"))?
        .parse()
        .context("owner/recipient")?;
    let counterpart_chain_id: u64 = counterpart_chain
        .ok_or_else(|| anyhow!("missing counterpart chain id"))?
        .parse()
        .context("counterpart chain id")?;

    Ok(BridgeEvent {
        id: record.id.clone(),
        kind,
        token_address,
        token_id,
        user_address,
        counterpart_chain_id,
        counterpart_address,
        block_number,
        block_timestamp,
        transaction_hash,
    })
}

/// Convert an indexer response, skipping records that do not parse.
pub fn convert_feed_events(chain_id: u64, events: &FeedEvents) -> EventBatch {
    let mut batch = EventBatch::default();
    let lists = [
        (EventKind::Locked, &events.token_lockeds),
        (EventKind::Burned, &events.token_burneds),
        (EventKind::Minted, &events.token_minteds),
        (EventKind::Unlocked, &events.token_unlockeds),
    ];
    for (kind, records) in lists {
        for record in records {
            match convert_feed_event(kind, record) {
                Ok(event) => batch.push(event),
                Err(e) => {
                    warn!(chain_id, kind = %kind, event_id = %record.id, error = %e, "Skipping malformed indexer record")
                }
            }
        }
    }
    batch
}

/// Event source backed by the indexer with chain-log fallback.
#[derive(Debug)]
pub struct FeedEventSource {
    client: EventFeedClient,
    log_fetchers: HashMap<u64, LogEventFetcher>,
    /// Next block to scan, per chain.
    cursors: DashMap<u64, u64>,
}

impl FeedEventSource {
    /// Build log fetchers for every chain with a bridge contract.
    pub fn new(client: EventFeedClient, registry: &ChainRegistry) -> Self {
        let log_fetchers = registry
            .with_bridge()
            .filter_map(|chain| {
                let bridge = chain.bridge_address?;
                let fetcher = LogEventFetcher::new(
                    ChainClient::new(chain.chain_id, chain.rpc_url.clone()),
                    bridge,
                    chain.logs.max_block_span,
                    chain.logs.min_request_interval(),
                );
                Some((chain.chain_id, fetcher))
            })
            .collect();

        Self {
            client,
            log_fetchers,
            cursors: DashMap::new(),
        }
    }

    /// Block the next log scan starts from.
    pub fn cursor(&self, chain_id: u64) -> Option<u64> {
        self.cursors.get(&chain_id).map(|c| *c)
    }

    /// Scan bridge logs of a chain in `[from_block, to_block]`.
    pub async fn fetch_events_from_logs(
        &self,
        chain_id: u64,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<EventBatch> {
        let fetcher = self
            .log_fetchers
            .get(&chain_id)
            .ok_or_else(|| anyhow!("chain {chain_id} has no bridge contract for log scanning"))?;
        let (batch, _) = fetcher.fetch_events_from_logs(from_block, to_block).await?;
        Ok(batch)
    }

    #[instrument(skip(self, chain), fields(chain_id = chain.chain_id))]
    async fn fetch_from_logs(&self, chain: &ChainConfig, since: u64) -> Result<EventBatch> {
        let fetcher = self
            .log_fetchers
            .get(&chain.chain_id)
            .ok_or_else(|| anyhow!("chain {} has no event source", chain.chain_id))?;

        let from_block = match self.cursor(chain.chain_id) {
            Some(block) => block,
            None => match chain.logs.start_block {
                Some(block) => block,
                None => {
                    let latest = fetcher.client().block_number().await?;
                    latest.saturating_sub(chain.logs.lookback_blocks)
                }
            },
        };

        let (scanned, to_block) = fetcher.fetch_events_from_logs(from_block, None).await?;
        let (batch, next_cursor) = window_with_cursor(scanned, since, to_block);
        self.cursors.insert(chain.chain_id, next_cursor.max(from_block));

        debug!(from_block, to_block, next_cursor, events = batch.len(), "Scanned bridge logs");
        Ok(batch)
    }
}

/// Apply the since/limit window and pick the next scan start.
///
/// Normally the next scan starts after `to_block`. If a kind was truncated the
/// scan resumes at the last kept block of that kind so nothing is skipped.
fn window_with_cursor(scanned: EventBatch, since: u64, to_block: u64) -> (EventBatch, u64) {
    let full = scanned.window(since, usize::MAX);
    let mut next = to_block.saturating_add(1);
    for list in [&full.locked, &full.burned, &full.minted, &full.unlocked] {
        if list.len() > PAGE_SIZE {
            next = next.min(list[PAGE_SIZE - 1].block_number);
        }
    }
    (full.window(since, PAGE_SIZE), next)
}

#[async_trait]
impl EventSource for FeedEventSource {
    async fn fetch_events(&self, chain: &ChainConfig, since: u64) -> Result<EventBatch> {
        if let Some(url) = &chain.event_feed_url {
            match self.client.fetch_events(url, since).await {
                Ok(events) => {
                    let batch = convert_feed_events(chain.chain_id, &events).window(since, PAGE_SIZE);
                    return Ok(batch);
                }
                Err(e) if self.log_fetchers.contains_key(&chain.chain_id) => {
                    warn!(chain_id = chain.chain_id, error = %e, "Indexer request failed, scanning logs");
                }
                Err(e) => return Err(e.context(format!("indexer for chain {}", chain.chain_id))),
            }
        }
        self.fetch_from_logs(chain, since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::locked_event;

    fn record() -> FeedEvent {
        FeedEvent {
            id: "0xaa-1".to_string(),
            token_address: "0x1111111111111111111111111111111111111111".to_string(),
            token_id: "42".to_string(),
            owner: Some("0x2222222222222222222222222222222222222222".to_string()),
            recipient: None,
            target_chain_id: Some("80002".to_string()),
            target_address: Some("0x4444444444444444444444444444444444444444".to_string()),
            source_chain_id: None,
            block_number: "500".to_string(),
            block_timestamp: "1700000000".to_string(),
            transaction_hash: format!("0x{}", "ab".repeat(32)),
        }
    }

    #[test]
    fn test_convert_locked_record() {
        let event = convert_feed_event(EventKind::Locked, &record()).unwrap();
        assert_eq!(event.id, "0xaa-1");
        assert_eq!(event.token_id, U256::from(42));
        assert_eq!(event.counterpart_chain_id, 80002);
        assert_eq!(event.block_timestamp, 1_700_000_000);
        assert_eq!(event.transaction_hash, B256::repeat_byte(0xab));
        assert_eq!(event.dedup_key(), "locked_0xaa-1");
    }

    #[test]
    fn test_convert_minted_record() {
        let mut minted = record();
        minted.owner = None;
        minted.target_chain_id = None;
        minted.target_address = None;
        minted.recipient = Some("0x2222222222222222222222222222222222222222".to_string());
        minted.source_chain_id = Some("11155111".to_string());

        let event = convert_feed_event(EventKind::Minted, &minted).unwrap();
        assert_eq!(event.counterpart_chain_id, 11155111);
        assert!(event.counterpart_address.is_none());
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let mut bad_timestamp = record();
        bad_timestamp.id = "bad-ts".to_string();
        bad_timestamp.block_timestamp = "soon".to_string();
        let mut bad_address = record();
        bad_address.id = "bad-addr".to_string();
        bad_address.token_address = "0x123".to_string();

        let events = FeedEvents {
            token_lockeds: vec![record(), bad_timestamp, bad_address],
            ..Default::default()
        };
        let batch = convert_feed_events(11155111, &events);
        assert_eq!(batch.locked.len(), 1);
        assert_eq!(batch.locked[0].id, "0xaa-1");
    }

    #[test]
    fn test_cursor_after_full_scan() {
        let mut scanned = EventBatch::default();
        scanned.push(locked_event("a", 2, 100));
        scanned.push(locked_event("b", 2, 40));

        let (batch, next) = window_with_cursor(scanned, 50, 900);
        assert_eq!(batch.locked.len(), 1);
        assert_eq!(next, 901);
    }

    #[test]
    fn test_cursor_rewinds_when_truncated() {
        let mut scanned = EventBatch::default();
        for i in 0..(PAGE_SIZE as u64 + 5) {
            scanned.push(locked_event(&format!("e{i}"), 2, 1000 + i));
        }

        let (batch, next) = window_with_cursor(scanned, 0, 5000);
        assert_eq!(batch.locked.len(), PAGE_SIZE);
        // Block of the last kept event
        assert_eq!(next, 1000 + PAGE_SIZE as u64 - 1);
    }
}
