//! Bridge events read straight from chain logs.
//!
//! Used when the indexer is not configured or not reachable. Ranges are split
//! into chunks of at most `max_block_span` blocks and every `eth_getLogs`
//! request waits for a minimum gap after the previous one, since public RPC
//! endpoints reject wide ranges and bursts.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use anyhow::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::contracts::IBridge;
use crate::errors::{classify_error, FailureKind};
use crate::events::{BridgeEvent, EventBatch, EventKind};
use crate::provider::ChainClient;

/// Split `[from, to]` into inclusive chunks of at most `span` blocks.
pub fn block_ranges(from: u64, to: u64, span: u64) -> Vec<(u64, u64)> {
    let span = span.max(1);
    let mut ranges = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(span - 1).min(to);
        ranges.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    ranges
}

/// Enforces a minimum gap between consecutive requests.
#[derive(Debug)]
struct RequestThrottle {
    min_interval: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

impl RequestThrottle {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: tokio::sync::Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Fetches bridge events of one chain from `eth_getLogs`.
#[derive(Debug)]
pub struct LogEventFetcher {
    client: ChainClient,
    bridge_address: Address,
    max_block_span: u64,
    throttle: RequestThrottle,
}

impl LogEventFetcher {
    pub fn new(
        client: ChainClient,
        bridge_address: Address,
        max_block_span: u64,
        min_request_interval: Duration,
    ) -> Self {
        Self {
            client,
            bridge_address,
            max_block_span,
            throttle: RequestThrottle::new(min_request_interval),
        }
    }

    pub fn client(&self) -> &ChainClient {
        &self.client
    }

    /// Fetch the four bridge event kinds in `[from_block, to_block]`.
    ///
    /// `to_block` defaults to the latest block. Returns the batch and the last
    /// block that was scanned.
    #[instrument(skip(self), fields(chain_id = self.client.chain_id()))]
    pub async fn fetch_events_from_logs(
        &self,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<(EventBatch, u64)> {
        let to_block = match to_block {
            Some(block) => block,
            None => self.client.block_number().await?,
        };

        let mut batch = EventBatch::default();
        if from_block > to_block {
            return Ok((batch, to_block));
        }

        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        for (start, end) in block_ranges(from_block, to_block, self.max_block_span) {
            for kind in [
                EventKind::Locked,
                EventKind::Burned,
                EventKind::Minted,
                EventKind::Unlocked,
            ] {
                let logs = self.query_kind(kind, start, end).await?;
                for log in logs {
                    let Some(block_number) = log.block_number else {
                        continue;
                    };
                    let timestamp = match timestamps.get(&block_number) {
                        Some(ts) => *ts,
                        None => {
                            let ts = self.client.block_timestamp(block_number).await?;
                            timestamps.insert(block_number, ts);
                            ts
                        }
                    };
                    if let Some(event) = parse_bridge_log(kind, &log, timestamp) {
                        batch.push(event);
                    }
                }
            }
        }

        debug!(
            from_block,
            to_block,
            events = batch.len(),
            "Fetched bridge events from logs"
        );
        Ok((batch, to_block))
    }

    async fn query_kind(&self, kind: EventKind, from: u64, to: u64) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(self.bridge_address)
            .event_signature(event_signature(kind))
            .from_block(from)
            .to_block(to);

        self.throttle.wait().await;
        match self.client.get_logs(&filter).await {
            Ok(logs) => Ok(logs),
            Err(e) if classify_error(&e) == FailureKind::UnsupportedQuery => {
                warn!(
                    chain_id = self.client.chain_id(),
                    kind = %kind,
                    error = %e,
                    "Log queries not supported by provider"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e.context(format!("eth_getLogs {kind} [{from}, {to}]"))),
        }
    }
}

/// Topic0 of the bridge event of the given kind.
pub fn event_signature(kind: EventKind) -> B256 {
    match kind {
        EventKind::Locked => IBridge::TokenLocked::SIGNATURE_HASH,
        EventKind::Burned => IBridge::TokenBurned::SIGNATURE_HASH,
        EventKind::Minted => IBridge::TokenMinted::SIGNATURE_HASH,
        EventKind::Unlocked => IBridge::TokenUnlocked::SIGNATURE_HASH,
    }
}

/// Decode a bridge log into an event.
pub fn parse_bridge_log(kind: EventKind, log: &Log, block_timestamp: u64) -> Option<BridgeEvent> {
    let transaction_hash = log.transaction_hash?;
    let block_number = log.block_number.unwrap_or(0);
    let id = format!("{:#x}-{}", transaction_hash, log.log_index.unwrap_or(0));

    let (token_address, token_id, user_address, counterpart_chain_id, counterpart_address) =
        match kind {
            EventKind::Locked => {
                let e = log.log_decode::<IBridge::TokenLocked>().ok()?.inner.data;
                (e.tokenAddress, e.tokenId, e.owner, e.targetChainId, Some(e.targetAddress))
            }
            EventKind::Burned => {
                let e = log.log_decode::<IBridge::TokenBurned>().ok()?.inner.data;
                (e.tokenAddress, e.tokenId, e.owner, e.targetChainId, Some(e.targetAddress))
            }
            EventKind::Minted => {
                let e = log.log_decode::<IBridge::TokenMinted>().ok()?.inner.data;
                (e.tokenAddress, e.tokenId, e.recipient, e.sourceChainId, None)
            }
            EventKind::Unlocked => {
                let e = log.log_decode::<IBridge::TokenUnlocked>().ok()?.inner.data;
                (e.tokenAddress, e.tokenId, e.recipient, e.sourceChainId, None)
            }
        };

    let counterpart_chain_id = match u64::try_from(counterpart_chain_id) {
        Ok(id) => id,
        Err(_) => {
            warn!(event_id = %id, "Chain id out of range, skipping log");
            return None;
        }
    };

    Some(BridgeEvent {
        id,
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
