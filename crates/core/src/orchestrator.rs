//! Relay orchestrator.
//!
//! Owns the main poll loop: per chain it re-attempts queued failures, fetches
//! new bridge events since the chain's watermark, relays Locked and Burned
//! events in block order and advances the watermark. Chains are polled concurrently, events
//! of one chain sequentially.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use relayer_api::PAGE_SIZE;
use relayer_chain::{BridgeContract, BridgeEvent};
use std::collections::HashMap;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::bridge::{BridgeProcessor, MintStatus};
use crate::config::{ChainConfig, RelayConfig};
use crate::event_feed::EventSource;
use crate::liquidation::LiquidationProcessor;
use crate::registry::ChainRegistry;
use crate::retry::{RetryPolicy, RetryQueue};
use crate::status::{ChainStatus, LiquidationStatus, RelayerStatus};
use crate::watermark::Watermarks;

#[derive(Debug, Clone, Default)]
struct ChainState {
    connected: bool,
    last_poll_at: Option<DateTime<Utc>>,
}

/// Multi-chain relayer.
#[derive(Debug)]
pub struct Relayer {
    registry: Arc<ChainRegistry>,
    config: RelayConfig,
    /// Wallet that signs mints; must hold the operator role on every bridge.
    operator: Address,
    bridges: HashMap<u64, Arc<dyn BridgeContract>>,
    source: Arc<dyn EventSource>,
    processor: BridgeProcessor,
    liquidation: Option<Arc<LiquidationProcessor>>,
    watermarks: Watermarks,
    retries: RetryQueue,
    chain_state: DashMap<u64, ChainState>,
    running: AtomicBool,
    shutdown: Notify,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl Relayer {
    pub fn new(
        registry: Arc<ChainRegistry>,
        config: RelayConfig,
        operator: Address,
        bridges: HashMap<u64, Arc<dyn BridgeContract>>,
        source: Arc<dyn EventSource>,
    ) -> Self {
        let processor = BridgeProcessor::new(
            Arc::clone(&registry),
            bridges.clone(),
            RetryPolicy::from_config(&config),
        );

        Self {
            registry,
            config,
            operator,
            bridges,
            source,
            processor,
            liquidation: None,
            watermarks: Watermarks::new(),
            retries: RetryQueue::new(),
            chain_state: DashMap::new(),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
            poll_task: Mutex::new(None),
        }
    }

    /// Attach the liquidation processor.
    pub fn with_liquidation(mut self, liquidation: Arc<LiquidationProcessor>) -> Self {
        self.liquidation = Some(liquidation);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Verify operator roles, start liquidation and spawn the poll loop.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Relayer already running");
            return;
        }
        info!(chains = self.registry.len(), operator = %self.operator, "Starting relayer");

        self.verify_operators().await;

        if let Some(liquidation) = &self.liquidation {
            if liquidation.is_enabled() {
                liquidation.start().await;
            } else {
                info!("Liquidation disabled");
            }
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                this.poll_once().await;
                if !this.wait_for_next_poll().await {
                    break;
                }
            }
            debug!("Poll loop stopped");
        });
        if let Some(previous) = self.poll_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the poll loop and the liquidation loops. In-flight work finishes.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_waiters();
        if let Some(liquidation) = &self.liquidation {
            liquidation.stop();
        }
        info!("Relayer stopped");
    }

    async fn wait_for_next_poll(&self) -> bool {
        let mut notified = pin!(self.shutdown.notified());
        notified.as_mut().enable();
        if !self.is_running() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.config.poll_interval()) => self.is_running(),
            _ = notified => false,
        }
    }

    /// Log whether the wallet holds the operator role on each bridge.
    async fn verify_operators(&self) {
        let mut chain_ids: Vec<u64> = self.bridges.keys().copied().collect();
        chain_ids.sort_unstable();

        for chain_id in chain_ids {
            let Some(bridge) = self.bridges.get(&chain_id) else {
                continue;
            };
            match bridge.is_operator(self.operator).await {
                Ok(true) => info!(chain_id, "Operator role verified"),
                Ok(false) => warn!(chain_id, operator = %self.operator, "Wallet is not an operator, mints will revert"),
                Err(e) => warn!(chain_id, error = %format!("{e:#}"), "Could not verify operator role"),
            }
        }
    }

    /// Poll every chain with an event source once.
    pub async fn poll_once(&self) {
        let chains: Vec<&ChainConfig> = self
            .registry
            .chains()
            .iter()
            .filter(|c| c.has_event_source())
            .collect();
        join_all(chains.into_iter().map(|chain| self.poll_chain(chain))).await;
    }

    #[instrument(skip(self, chain), fields(chain_id = chain.chain_id))]
    async fn poll_chain(&self, chain: &ChainConfig) {
        let chain_id = chain.chain_id;

        let queued = self.retries.take(chain_id);
        if !queued.is_empty() {
            info!(count = queued.len(), "Retrying failed events");
            for event in queued {
                self.relay(chain_id, event).await;
            }
        }

        let since = self.watermarks.get(chain_id);
        let batch = match self.source.fetch_events(chain, since).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(since, error = %format!("{e:#}"), "Failed to fetch bridge events");
                self.chain_state.entry(chain_id).or_default().connected = false;
                return;
            }
        };
        {
            let mut state = self.chain_state.entry(chain_id).or_default();
            state.connected = true;
            state.last_poll_at = Some(Utc::now());
        }

        if !batch.is_empty() {
            debug!(
                since,
                locked = batch.locked.len(),
                burned = batch.burned.len(),
                minted = batch.minted.len(),
                unlocked = batch.unlocked.len(),
                "Fetched bridge events"
            );
        }

        // Resume below any kind that filled its page; the dedup set absorbs
        // boundary events fetched twice
        let resume = batch.resume_timestamp(since, PAGE_SIZE);
        for event in batch.into_relayable() {
            self.relay(chain_id, event).await;
        }

        if let Some(timestamp) = resume {
            let watermark = self.watermarks.advance(chain_id, timestamp);
            debug!(watermark, "Watermark advanced");
        }
    }

    /// Relay one event, queueing it for the next poll on failure.
    async fn relay(&self, chain_id: u64, event: BridgeEvent) {
        match self.processor.process(chain_id, &event).await {
            Ok(MintStatus::Minted { tx_hash }) => {
                debug!(event_id = %event.id, tx_hash = %tx_hash, "Event relayed")
            }
            Ok(status) => debug!(event_id = %event.id, ?status, "Event not relayed"),
            Err(e) => {
                warn!(
                    event_id = %event.id,
                    kind = %event.kind,
                    error = %format!("{e:#}"),
                    "Event processing failed, will retry next poll"
                );
                self.retries.push(chain_id, event);
            }
        }
    }

    pub fn watermark(&self, chain_id: u64) -> u64 {
        self.watermarks.get(chain_id)
    }

    pub fn status(&self) -> RelayerStatus {
        let chains = self
            .registry
            .chains()
            .iter()
            .map(|chain| {
                let state = self
                    .chain_state
                    .get(&chain.chain_id)
                    .map(|s| s.clone())
                    .unwrap_or_default();
                ChainStatus {
                    chain_id: chain.chain_id,
                    name: chain.name.clone(),
                    connected: state.connected,
                    watermark: self.watermarks.get(chain.chain_id),
                    last_poll_at: state.last_poll_at,
                    pending_retries: self.retries.len(chain.chain_id),
                }
            })
            .collect();

        let (discovered_pool_count, liquidation) = match &self.liquidation {
            Some(l) => (l.discovered_pool_count(), l.status()),
            None => (0, LiquidationStatus::default()),
        };

        RelayerStatus {
            running: self.is_running(),
            chains,
            processed_event_count: self.processor.processed_count(),
            discovered_pool_count,
            liquidation,
        }
    }
}
