//! Read-only RPC access to a chain.

use alloy::eips::BlockNumberOrTag;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use anyhow::{Context, Result};

/// HTTP client for block and log queries.
#[derive(Debug, Clone)]
pub struct ChainClient {
    chain_id: u64,
    rpc_url: String,
}

impl ChainClient {
    pub fn new(chain_id: u64, rpc_url: impl Into<String>) -> Self {
        Self {
            chain_id,
            rpc_url: rpc_url.into(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        Ok(provider.get_block_number().await?)
    }

    /// Timestamp of the given block in seconds.
    pub async fn block_timestamp(&self, number: u64) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await?
            .with_context(|| format!("block {number} not found on chain {}", self.chain_id))?;
        Ok(block.header.timestamp)
    }

    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        Ok(provider.get_logs(filter).await?)
    }
}
