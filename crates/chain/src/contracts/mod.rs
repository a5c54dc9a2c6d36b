//! Bridge and lending contract interfaces.
//!
//! The relayer talks to two on-chain contracts per chain: the bridge (mints
//! wrapped tokens on behalf of the user) and the lending contract (pools of
//! NFT collateral that can be liquidated). Both are modelled as traits so the
//! processors in `relayer-core` can be driven by in-memory mocks.
//!
//! # Example
//!
//! ```rust,ignore
//! use relayer_chain::contracts::{BridgeContract, EvmBridge, MintRequest};
//!
//! let bridge = EvmBridge::new(address, sender.clone(), Duration::from_secs(120));
//! if !bridge.is_transaction_processed(source_tx).await? {
//!     let gas = bridge.estimate_mint(&request).await?;
//!     let outcome = bridge.submit_mint(&request, gas).await?;
//! }
//! ```

pub mod bridge;
pub mod lending;

pub use bridge::{EvmBridge, IBridge};
pub use lending::{parse_liquidation_logs, EvmLending, ILending};

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

use crate::gas::GasParams;
use crate::signer::TxOutcome;

/// Arguments of `mintToken` on the target bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    /// Token contract on the target chain.
    pub token_address: Address,
    pub token_id: U256,
    pub recipient: Address,
    pub source_chain_id: u64,
    /// Transaction that locked or burned the token on the source chain.
    pub source_tx_hash: B256,
}

/// Gas settings for a single submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxGas {
    pub gas_limit: u64,
    pub fees: GasParams,
}

/// Tokens reported by a liquidation event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidatedTokens {
    pub count: u64,
    pub token_ids: Vec<U256>,
}

/// Mined liquidation transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationReceipt {
    pub tx_hash: B256,
    pub success: bool,
    /// `None` when the receipt carries no liquidation event.
    pub liquidated: Option<LiquidatedTokens>,
}

/// Bridge contract on one chain.
#[async_trait]
pub trait BridgeContract: Send + Sync + Debug {
    fn chain_id(&self) -> u64;

    fn address(&self) -> Address;

    /// Whether `account` holds the operator role.
    async fn is_operator(&self, account: Address) -> Result<bool>;

    /// Whether the source transaction has already been minted for.
    async fn is_transaction_processed(&self, source_tx_hash: B256) -> Result<bool>;

    /// Raw gas estimate for `mintToken`.
    async fn estimate_mint(&self, request: &MintRequest) -> Result<u64>;

    /// Submit `mintToken` with the given gas limit and wait for the receipt.
    async fn submit_mint(&self, request: &MintRequest, gas_limit: u64) -> Result<TxOutcome>;
}

/// Lending contract on one chain.
#[async_trait]
pub trait LendingContract: Send + Sync + Debug {
    fn chain_id(&self) -> u64;

    async fn pool_exists(&self, pool_id: u64) -> Result<bool>;

    /// All pool ids known to the contract.
    async fn list_pools(&self) -> Result<Vec<u64>>;

    /// Token ids in `[from, to)` of the pool that are currently liquidatable.
    async fn check_liquidatable(&self, pool_id: u64, from: u64, to: u64) -> Result<Vec<U256>>;

    async fn estimate_batch_liquidate(&self, pool_id: u64, token_ids: &[U256]) -> Result<u64>;

    async fn estimate_auto_liquidate(&self, pool_id: u64, from: u64, count: u64) -> Result<u64>;

    /// Current fee data for the chain.
    async fn fee_params(&self) -> Result<GasParams>;

    async fn submit_batch_liquidate(
        &self,
        pool_id: u64,
        token_ids: &[U256],
        gas: &TxGas,
    ) -> Result<LiquidationReceipt>;

    async fn submit_auto_liquidate(
        &self,
        pool_id: u64,
        from: u64,
        count: u64,
        gas: &TxGas,
    ) -> Result<LiquidationReceipt>;
}
