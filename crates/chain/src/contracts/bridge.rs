//! Bridge contract bindings and EVM implementation.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{BridgeContract, MintRequest};
use crate::signer::{TransactionSender, TxOutcome};

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IBridge {
        event TokenLocked(
            address indexed tokenAddress,
            uint256 indexed tokenId,
            address indexed owner,
            uint256 targetChainId,
            address targetAddress
        );
        event TokenBurned(
            address indexed tokenAddress,
            uint256 indexed tokenId,
            address indexed owner,
            uint256 targetChainId,
            address targetAddress
        );
        event TokenMinted(
            address indexed tokenAddress,
            uint256 indexed tokenId,
            address indexed recipient,
            uint256 sourceChainId,
            bytes32 sourceTxHash
        );
        event TokenUnlocked(
            address indexed tokenAddress,
            uint256 indexed tokenId,
            address indexed recipient,
            uint256 sourceChainId,
            bytes32 sourceTxHash
        );

        function isOperator(address account) external view returns (bool);
        function isTransactionProcessed(bytes32 txHash) external view returns (bool);
        function mintToken(
            address tokenAddress,
            uint256 tokenId,
            address recipient,
            uint256 sourceChainId,
            bytes32 sourceTxHash
        ) external;
    }
}

/// Encode `mintToken` calldata.
pub fn encode_mint(request: &MintRequest) -> Bytes {
    let call = IBridge::mintTokenCall {
        tokenAddress: request.token_address,
        tokenId: request.token_id,
        recipient: request.recipient,
        sourceChainId: U256::from(request.source_chain_id),
        sourceTxHash: request.source_tx_hash,
    };
    Bytes::from(call.abi_encode())
}

/// Bridge deployed on an EVM chain.
#[derive(Debug)]
pub struct EvmBridge {
    address: Address,
    sender: Arc<TransactionSender>,
    confirmation_timeout: Duration,
}

impl EvmBridge {
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
}

#[async_trait]
impl BridgeContract for EvmBridge {
    fn chain_id(&self) -> u64 {
        self.sender.chain_id()
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn is_operator(&self, account: Address) -> Result<bool> {
        let provider = ProviderBuilder::new().on_http(self.sender.rpc_url().parse()?);
        let contract = IBridge::new(self.address, &provider);
        let result = contract
            .isOperator(account)
            .call()
            .await
            .context("isOperator call")?;
        Ok(result._0)
    }

    async fn is_transaction_processed(&self, source_tx_hash: B256) -> Result<bool> {
        let provider = ProviderBuilder::new().on_http(self.sender.rpc_url().parse()?);
        let contract = IBridge::new(self.address, &provider);
        let result = contract
            .isTransactionProcessed(source_tx_hash)
            .call()
            .await
            .context("isTransactionProcessed call")?;
        Ok(result._0)
    }

    async fn estimate_mint(&self, request: &MintRequest) -> Result<u64> {
        let gas = self
            .sender
            .estimate_gas(self.address, encode_mint(request))
            .await
            .context("estimate mintToken")?;
        debug!(chain_id = self.chain_id(), gas, "Estimated mint gas");
        Ok(gas)
    }

    #[instrument(skip(self, request), fields(chain_id = self.chain_id(), token_id = %request.token_id))]
    async fn submit_mint(&self, request: &MintRequest, gas_limit: u64) -> Result<TxOutcome> {
        let fees = self.sender.fee_params().await.context("fetch fee data")?;
        self.sender
            .send(
                self.address,
                encode_mint(request),
                gas_limit,
                &fees,
                self.confirmation_timeout,
            )
            .await
    }
}
