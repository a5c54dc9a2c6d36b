//! Relays Locked and Burned events into mints on the counterpart chain.

use alloy::primitives::B256;
use anyhow::{anyhow, bail, Result};
use dashmap::DashSet;
use relayer_chain::gas::{apply_gas_buffer, MINT_GAS_BUFFER_PERCENT};
use relayer_chain::{BridgeContract, BridgeEvent, EventKind, MintRequest};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::registry::ChainRegistry;
use crate::retry::RetryPolicy;
use crate::token_mapper::TokenMapper;

/// Outcome of processing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintStatus {
    /// Already in the local processed set.
    AlreadyProcessed,
    /// The target bridge had already minted for the source transaction.
    VerifiedOnChain,
    Minted { tx_hash: B256 },
    /// No target chain or bridge contract; the event is dropped.
    Skipped,
}

/// Bridge processor.
///
/// Holds the set of events already relayed, keyed by `{kind}_{id}`. The set is
/// in memory only; after a restart the target bridge's
/// `isTransactionProcessed` guard prevents double mints.
#[derive(Debug)]
pub struct BridgeProcessor {
    registry: Arc<ChainRegistry>,
    mapper: TokenMapper,
    bridges: HashMap<u64, Arc<dyn BridgeContract>>,
    processed: DashSet<String>,
    policy: RetryPolicy,
}

impl BridgeProcessor {
    pub fn new(
        registry: Arc<ChainRegistry>,
        bridges: HashMap<u64, Arc<dyn BridgeContract>>,
        policy: RetryPolicy,
    ) -> Self {
        let mapper = TokenMapper::from_registry(&registry);
        Self {
            registry,
            mapper,
            bridges,
            processed: DashSet::new(),
            policy,
        }
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn is_processed(&self, event: &BridgeEvent) -> bool {
        self.processed.contains(&event.dedup_key())
    }

    /// Relay a TokenLocked event from `source_chain`.
    pub async fn process_locked_token(
        &self,
        source_chain: u64,
        event: &BridgeEvent,
    ) -> Result<MintStatus> {
        debug_assert_eq!(event.kind, EventKind::Locked);
        self.process_event(source_chain, event).await
    }

    /// Relay a TokenBurned event from `source_chain`.
    pub async fn process_burned_token(
        &self,
        source_chain: u64,
        event: &BridgeEvent,
    ) -> Result<MintStatus> {
        debug_assert_eq!(event.kind, EventKind::Burned);
        self.process_event(source_chain, event).await
    }

    /// Dispatch on the event kind. Minted and Unlocked events are not relayed.
    pub async fn process(&self, source_chain: u64, event: &BridgeEvent) -> Result<MintStatus> {
        match event.kind {
            EventKind::Locked => self.process_locked_token(source_chain, event).await,
            EventKind::Burned => self.process_burned_token(source_chain, event).await,
            other => bail!("{other} events are not relayed"),
        }
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, kind = %event.kind))]
    async fn process_event(&self, source_chain: u64, event: &BridgeEvent) -> Result<MintStatus> {
        let key = event.dedup_key();
        if self.processed.contains(&key) {
            debug!("Event already processed");
            return Ok(MintStatus::AlreadyProcessed);
        }

        let target_chain = event.counterpart_chain_id;
        let Some(target) = self.registry.get(target_chain) else {
            warn!(target_chain, "Unknown target chain, skipping event");
            return Ok(MintStatus::Skipped);
        };
        let Some(bridge) = self.bridges.get(&target_chain) else {
            warn!(target_chain, chain = %target.name, "No bridge contract on target chain, skipping event");
            return Ok(MintStatus::Skipped);
        };

        if bridge.is_transaction_processed(event.transaction_hash).await? {
            info!(target_chain, source_tx = %event.transaction_hash, "Source transaction already minted on target");
            self.processed.insert(key);
            return Ok(MintStatus::VerifiedOnChain);
        }

        let token_address = self
            .mapper
            .map_token_address(source_chain, target_chain, event.token_address)
            .ok_or_else(|| {
                anyhow!(
                    "token {} of chain {source_chain} has no counterpart on chain {target_chain}",
                    event.token_address
                )
            })?;
        let recipient = event
            .counterpart_address
            .ok_or_else(|| anyhow!("event {} has no target address", event.id))?;

        let request = MintRequest {
            token_address,
            token_id: event.token_id,
            recipient,
            source_chain_id: source_chain,
            source_tx_hash: event.transaction_hash,
        };

        let tx_hash = self.mint_with_retry(bridge.as_ref(), &request).await?;
        self.processed.insert(key);
        info!(target_chain, tx_hash = %tx_hash, token_id = %event.token_id, "Token minted on target chain");
        Ok(MintStatus::Minted { tx_hash })
    }

    async fn mint_with_retry(
        &self,
        bridge: &dyn BridgeContract,
        request: &MintRequest,
    ) -> Result<B256> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.try_mint(bridge, request).await {
                Ok(tx_hash) => return Ok(tx_hash),
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                warn!(attempt, error = %format!("{err:#}"), "Mint failed, retries exhausted");
                return Err(err.context(format!("mint failed after {attempt} attempts")));
            }

            let backoff = self.policy.linear_backoff(attempt);
            warn!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %format!("{err:#}"),
                "Mint attempt failed, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    async fn try_mint(&self, bridge: &dyn BridgeContract, request: &MintRequest) -> Result<B256> {
        let estimate = bridge.estimate_mint(request).await?;
        let gas_limit = apply_gas_buffer(estimate, MINT_GAS_BUFFER_PERCENT);
        let outcome = bridge.submit_mint(request, gas_limit).await?;
        if !outcome.success {
            bail!("mint transaction {} reverted", outcome.tx_hash);
        }
        Ok(outcome.tx_hash)
    }
}
