//! In-memory contract and event source doubles for processor tests.

use alloy::primitives::{Address, B256, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use relayer_chain::{
    BridgeContract, BridgeEvent, EventBatch, EventKind, GasParams, LendingContract,
    LiquidatedTokens, LiquidationReceipt, MintRequest, TxGas, TxOutcome,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::ChainConfig;
use crate::event_feed::EventSource;

pub const TOKEN_A: Address = Address::new([0xa1; 20]);
pub const RECIPIENT: Address = Address::new([0x44; 20]);

/// Chain with a bridge contract and the given token list.
pub fn chain_config(chain_id: u64, tokens: Vec<Address>) -> ChainConfig {
    ChainConfig {
        chain_id,
        name: format!("chain-{chain_id}"),
        rpc_url: "http://127.0.0.1:8545".to_string(),
        event_feed_url: None,
        bridge_address: Some(Address::repeat_byte(0x11)),
        lending_address: None,
        tokens,
        gas: Default::default(),
        logs: Default::default(),
    }
}

pub fn bridge_event(kind: EventKind, id: &str, target_chain: u64, timestamp: u64) -> BridgeEvent {
    BridgeEvent {
        id: id.to_string(),
        kind,
        token_address: TOKEN_A,
        token_id: U256::from(timestamp),
        user_address: Address::repeat_byte(0x22),
        counterpart_chain_id: target_chain,
        counterpart_address: Some(RECIPIENT),
        block_number: timestamp,
        block_timestamp: timestamp,
        transaction_hash: B256::left_padding_from(id.as_bytes()),
    }
}

pub fn locked_event(id: &str, target_chain: u64, timestamp: u64) -> BridgeEvent {
    bridge_event(EventKind::Locked, id, target_chain, timestamp)
}

pub fn burned_event(id: &str, target_chain: u64, timestamp: u64) -> BridgeEvent {
    bridge_event(EventKind::Burned, id, target_chain, timestamp)
}

/// Bridge that records mints and remembers processed source transactions.
#[derive(Debug, Default)]
pub struct MockBridge {
    pub chain_id: u64,
    pub operator: bool,
    processed: Mutex<HashSet<B256>>,
    mints: Mutex<Vec<MintRequest>>,
    /// Number of upcoming submissions that fail with `submit_error`.
    failing_submits: AtomicU32,
    /// Error of failing submissions; a transport error when unset.
    submit_error: Mutex<Option<String>>,
    /// Submissions that mine but revert.
    reverting_submits: AtomicU32,
    submit_attempts: AtomicU32,
}

impl MockBridge {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            operator: true,
            ..Default::default()
        }
    }

    pub fn fail_next_submits(&self, count: u32) {
        self.failing_submits.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_submits_with(&self, count: u32, message: &str) {
        *self.submit_error.lock() = Some(message.to_string());
        self.fail_next_submits(count);
    }

    pub fn revert_next_submits(&self, count: u32) {
        self.reverting_submits.store(count, Ordering::SeqCst);
    }

    pub fn mark_processed(&self, source_tx_hash: B256) {
        self.processed.lock().insert(source_tx_hash);
    }

    pub fn mints(&self) -> Vec<MintRequest> {
        self.mints.lock().clone()
    }

    pub fn submit_attempts(&self) -> u32 {
        self.submit_attempts.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl BridgeContract for MockBridge {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn address(&self) -> Address {
        Address::repeat_byte(0x11)
    }

    async fn is_operator(&self, _account: Address) -> Result<bool> {
        Ok(self.operator)
    }

    async fn is_transaction_processed(&self, source_tx_hash: B256) -> Result<bool> {
        Ok(self.processed.lock().contains(&source_tx_hash))
    }

    async fn estimate_mint(&self, _request: &MintRequest) -> Result<u64> {
        Ok(100_000)
    }

    async fn submit_mint(&self, request: &MintRequest, gas_limit: u64) -> Result<TxOutcome> {
        self.submit_attempts.fetch_add(1, Ordering::SeqCst);
        assert_eq!(gas_limit, 120_000, "mint gas limit must carry a 20% buffer");

        if take_one(&self.failing_submits) {
            let message = self
                .submit_error
                .lock()
                .clone()
                .unwrap_or_else(|| "network error: connection reset".to_string());
            return Err(anyhow!(message));
        }
        let success = !take_one(&self.reverting_submits);
        if success {
            self.processed.lock().insert(request.source_tx_hash);
            self.mints.lock().push(request.clone());
        }
        Ok(TxOutcome {
            tx_hash: B256::repeat_byte(0xee),
            success,
            block_number: Some(1),
            gas_used: 90_000,
            logs: Vec::new(),
        })
    }
}

/// Recorded lending contract interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LendingCall {
    ListPools,
    Check { pool_id: u64, from: u64, to: u64 },
    EstimateBatch { pool_id: u64 },
    EstimateAuto { pool_id: u64 },
    SubmitBatch { pool_id: u64, token_ids: Vec<U256>, gas: TxGas },
    SubmitAuto { pool_id: u64, from: u64, count: u64, gas: TxGas },
}

/// Scriptable lending contract.
#[derive(Debug, Default)]
pub struct MockLending {
    pub chain_id: u64,
    pub pools: Mutex<Vec<u64>>,
    pub liquidatable: Mutex<HashMap<u64, Vec<U256>>>,
    pub check_error: Mutex<Option<String>>,
    pub batch_estimate_error: Mutex<Option<String>>,
    pub auto_estimate_error: Mutex<Option<String>>,
    pub list_error: Mutex<Option<String>>,
    /// Errors returned by upcoming submissions, in order.
    pub submit_errors: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<LendingCall>>,
}

impl MockLending {
    pub fn new(chain_id: u64, pools: Vec<u64>) -> Self {
        Self {
            chain_id,
            pools: Mutex::new(pools),
            ..Default::default()
        }
    }

    pub fn set_liquidatable(&self, pool_id: u64, token_ids: Vec<u64>) {
        self.liquidatable
            .lock()
            .insert(pool_id, token_ids.into_iter().map(U256::from).collect());
    }

    pub fn calls(&self) -> Vec<LendingCall> {
        self.calls.lock().clone()
    }

    pub fn submissions(&self) -> Vec<LendingCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, LendingCall::SubmitBatch { .. } | LendingCall::SubmitAuto { .. }))
            .collect()
    }

    fn record(&self, call: LendingCall) {
        self.calls.lock().push(call);
    }

    fn next_submit_error(&self) -> Option<String> {
        self.submit_errors.lock().pop_front()
    }
}

#[async_trait]
impl LendingContract for MockLending {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn pool_exists(&self, pool_id: u64) -> Result<bool> {
        Ok(self.pools.lock().contains(&pool_id))
    }

    async fn list_pools(&self) -> Result<Vec<u64>> {
        self.record(LendingCall::ListPools);
        if let Some(err) = self.list_error.lock().clone() {
            return Err(anyhow!(err));
        }
        Ok(self.pools.lock().clone())
    }

    async fn check_liquidatable(&self, pool_id: u64, from: u64, to: u64) -> Result<Vec<U256>> {
        self.record(LendingCall::Check { pool_id, from, to });
        if let Some(err) = self.check_error.lock().clone() {
            return Err(anyhow!(err));
        }
        Ok(self.liquidatable.lock().get(&pool_id).cloned().unwrap_or_default())
    }

    async fn estimate_batch_liquidate(&self, pool_id: u64, _token_ids: &[U256]) -> Result<u64> {
        self.record(LendingCall::EstimateBatch { pool_id });
        match self.batch_estimate_error.lock().clone() {
            Some(err) => Err(anyhow!(err)),
            None => Ok(200_000),
        }
    }

    async fn estimate_auto_liquidate(&self, pool_id: u64, _from: u64, _count: u64) -> Result<u64> {
        self.record(LendingCall::EstimateAuto { pool_id });
        match self.auto_estimate_error.lock().clone() {
            Some(err) => Err(anyhow!(err)),
            None => Ok(300_000),
        }
    }

    async fn fee_params(&self) -> Result<GasParams> {
        Ok(GasParams::Eip1559 {
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            base_fee: 24_000_000_000,
        })
    }

    async fn submit_batch_liquidate(
        &self,
        pool_id: u64,
        token_ids: &[U256],
        gas: &TxGas,
    ) -> Result<LiquidationReceipt> {
        self.record(LendingCall::SubmitBatch {
            pool_id,
            token_ids: token_ids.to_vec(),
            gas: gas.clone(),
        });
        if let Some(err) = self.next_submit_error() {
            return Err(anyhow!(err));
        }
        Ok(LiquidationReceipt {
            tx_hash: B256::repeat_byte(0xbb),
            success: true,
            liquidated: Some(LiquidatedTokens {
                count: token_ids.len() as u64,
                token_ids: token_ids.to_vec(),
            }),
        })
    }

    async fn submit_auto_liquidate(
        &self,
        pool_id: u64,
        from: u64,
        count: u64,
        gas: &TxGas,
    ) -> Result<LiquidationReceipt> {
        self.record(LendingCall::SubmitAuto {
            pool_id,
            from,
            count,
            gas: gas.clone(),
        });
        if let Some(err) = self.next_submit_error() {
            return Err(anyhow!(err));
        }
        let token_ids = self.liquidatable.lock().get(&pool_id).cloned().unwrap_or_default();
        Ok(LiquidationReceipt {
            tx_hash: B256::repeat_byte(0xaa),
            success: true,
            liquidated: Some(LiquidatedTokens {
                count: token_ids.len() as u64,
                token_ids,
            }),
        })
    }
}

/// Event source serving a fixed event list per chain, filtered by timestamp.
#[derive(Debug, Default)]
pub struct MockEventSource {
    events: Mutex<HashMap<u64, Vec<BridgeEvent>>>,
    failing: Mutex<HashSet<u64>>,
    requests: Mutex<Vec<(u64, u64)>>,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&self, chain_id: u64, event: BridgeEvent) {
        self.events.lock().entry(chain_id).or_default().push(event);
    }

    pub fn set_failing(&self, chain_id: u64, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(chain_id);
        } else {
            set.remove(&chain_id);
        }
    }

    /// `(chain_id, since)` of every fetch.
    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn fetch_events(&self, chain: &ChainConfig, since: u64) -> Result<EventBatch> {
        self.requests.lock().push((chain.chain_id, since));
        if self.failing.lock().contains(&chain.chain_id) {
            return Err(anyhow!("indexer returned HTTP 503: unavailable"));
        }
        let mut batch = EventBatch::default();
        for event in self.events.lock().get(&chain.chain_id).cloned().unwrap_or_default() {
            batch.push(event);
        }
        Ok(batch.window(since, 100))
    }
}
