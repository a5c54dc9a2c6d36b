//! Lending contract bindings and EVM implementation.

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ProviderBuilder;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{LendingContract, LiquidatedTokens, LiquidationReceipt, TxGas};
use crate::gas::GasParams;
use crate::signer::{TransactionSender, TxOutcome};

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILending {
        event BatchLiquidationCompleted(uint256 indexed poolId, uint256[] tokenIds, uint256 liquidatedCount);
        event AutoLiquidationStarted(uint256 indexed poolId, uint256[] tokenIds, uint256 liquidatedCount);

        error NoLiquidatableCollateral();

        function isPoolExist(uint256 poolId) external view returns (bool);
        function listPool() external view returns (uint256[] memory);
        function checkLiquidatableCollateral(uint256 poolId, uint256 from, uint256 to)
            external view returns (uint256[] memory);
        function batchLiquidateAndStartAuctions(uint256 poolId, uint256[] tokenIds) external;
        function autoLiquidatePool(uint256 poolId, uint256 from, uint256 count) external;
    }
}

pub fn encode_batch_liquidate(pool_id: u64, token_ids: &[U256]) -> Bytes {
    let call = ILending::batchLiquidateAndStartAuctionsCall {
        poolId: U256::from(pool_id),
        tokenIds: token_ids.to_vec(),
    };
    Bytes::from(call.abi_encode())
}

pub fn encode_auto_liquidate(pool_id: u64, from: u64, count: u64) -> Bytes {
    let call = ILending::autoLiquidatePoolCall {
        poolId: U256::from(pool_id),
        from: U256::from(from),
        count: U256::from(count),
    };
    Bytes::from(call.abi_encode())
}

/// Find the first liquidation event in receipt logs.
///
/// Accepts either `BatchLiquidationCompleted` or `AutoLiquidationStarted`.
pub fn parse_liquidation_logs(logs: &[Log]) -> Option<LiquidatedTokens> {
    logs.iter().find_map(|log| {
        if let Ok(decoded) = log.log_decode::<ILending::BatchLiquidationCompleted>() {
            let event = decoded.inner.data;
            return Some(LiquidatedTokens {
                count: event.liquidatedCount.saturating_to::<u64>(),
                token_ids: event.tokenIds,
            });
        }
        if let Ok(decoded) = log.log_decode::<ILending::AutoLiquidationStarted>() {
            let event = decoded.inner.data;
            return Some(LiquidatedTokens {
                count: event.liquidatedCount.saturating_to::<u64>(),
                token_ids: event.tokenIds,
            });
        }
        None
    })
}

fn to_receipt(outcome: TxOutcome) -> LiquidationReceipt {
    LiquidationReceipt {
        tx_hash: outcome.tx_hash,
        success: outcome.success,
        liquidated: parse_liquidation_logs(&outcome.logs),
    }
}

/// Lending contract deployed on an EVM chain.
#[derive(Debug)]
pub struct EvmLending {
    address: Address,
    sender: Arc<TransactionSender>,
    confirmation_timeout: Duration,
}

impl EvmLending {
    pub fn new(
        address: Address,
        sender: Arc<TransactionSender>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            address,
            sender,
            confirmation_timeout,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

#[async_trait]
impl LendingContract for EvmLending {
    fn chain_id(&self) -> u64 {
        self.sender.chain_id()
    }

    async fn pool_exists(&self, pool_id: u64) -> Result<bool> {
        let provider = ProviderBuilder::new().on_http(self.sender.rpc_url().parse()?);
        let contract = ILending::new(self.address, &provider);
        let result = contract.isPoolExist(U256::from(pool_id)).call().await?;
        Ok(result._0)
    }

    async fn list_pools(&self) -> Result<Vec<u64>> {
        let provider = ProviderBuilder::new().on_http(self.sender.rpc_url().parse()?);
        let contract = ILending::new(self.address, &provider);
        let result = contract.listPool().call().await.context("listPool call")?;
        Ok(result
            ._0
            .into_iter()
            .map(|id| id.saturating_to::<u64>())
            .collect())
    }

    async fn check_liquidatable(&self, pool_id: u64, from: u64, to: u64) -> Result<Vec<U256>> {
        let provider = ProviderBuilder::new().on_http(self.sender.rpc_url().parse()?);
        let contract = ILending::new(self.address, &provider);
        let result = contract
            .checkLiquidatableCollateral(U256::from(pool_id), U256::from(from), U256::from(to))
            .call()
            .await?;
        debug!(
            chain_id = self.chain_id(),
            pool_id,
            found = result._0.len(),
            "Checked liquidatable collateral"
        );
        Ok(result._0)
    }

    async fn estimate_batch_liquidate(&self, pool_id: u64, token_ids: &[U256]) -> Result<u64> {
        self.sender
            .estimate_gas(self.address, encode_batch_liquidate(pool_id, token_ids))
            .await
    }

    async fn estimate_auto_liquidate(&self, pool_id: u64, from: u64, count: u64) -> Result<u64> {
        self.sender
            .estimate_gas(self.address, encode_auto_liquidate(pool_id, from, count))
            .await
    }

    async fn fee_params(&self) -> Result<GasParams> {
        self.sender.fee_params().await
    }

    #[instrument(skip(self, token_ids, gas), fields(chain_id = self.chain_id(), count = token_ids.len()))]
    async fn submit_batch_liquidate(
        &self,
        pool_id: u64,
        token_ids: &[U256],
        gas: &TxGas,
    ) -> Result<LiquidationReceipt> {
        let outcome = self
            .sender
            .send(
                self.address,
                encode_batch_liquidate(pool_id, token_ids),
                gas.gas_limit,
                &gas.fees,
                self.confirmation_timeout,
            )
            .await?;
        Ok(to_receipt(outcome))
    }

    #[instrument(skip(self, gas), fields(chain_id = self.chain_id()))]
    async fn submit_auto_liquidate(
        &self,
        pool_id: u64,
        from: u64,
        count: u64,
        gas: &TxGas,
    ) -> Result<LiquidationReceipt> {
        let outcome = self
            .sender
            .send(
                self.address,
                encode_auto_liquidate(pool_id, from, count),
                gas.gas_limit,
                &gas.fees,
                self.confirmation_timeout,
            )
            .await?;
        Ok(to_receipt(outcome))
    }
}
