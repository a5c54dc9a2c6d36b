//! Per-chain configuration.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static metadata of one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain ID
    pub chain_id: u64,
    /// Human-readable name
    pub name: String,
    /// HTTP RPC endpoint
    pub rpc_url: String,
    /// GraphQL endpoint of the bridge event indexer
    #[serde(default)]
    pub event_feed_url: Option<String>,
    /// Bridge contract; chains without one are never mint targets
    #[serde(default)]
    pub bridge_address: Option<Address>,
    /// Lending contract; chains without one are not liquidated
    #[serde(default)]
    pub lending_address: Option<Address>,
    /// Bridgeable token contracts, positionally aligned across chains
    #[serde(default)]
    pub tokens: Vec<Address>,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub logs: LogScanConfig,
}

impl ChainConfig {
    /// Whether bridge events can be read for this chain.
    pub fn has_event_source(&self) -> bool {
        self.event_feed_url.is_some() || self.bridge_address.is_some()
    }
}

/// Gas pricing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    #[serde(default)]
    pub pricing: GasPricingModel,
    /// Maximum gas price willing to pay (in gwei)
    #[serde(default = "default_max_gas_price")]
    pub max_gas_price_gwei: f64,
    /// Gas price used when the node gives none (in gwei)
    #[serde(default = "default_gas_price")]
    pub default_gas_price_gwei: f64,
    /// Priority fee for EIP-1559 transactions (in gwei)
    #[serde(default)]
    pub priority_fee_gwei: Option<f64>,
}

fn default_max_gas_price() -> f64 {
    100.0
}

fn default_gas_price() -> f64 {
    1.0
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            pricing: GasPricingModel::default(),
            max_gas_price_gwei: default_max_gas_price(),
            default_gas_price_gwei: default_gas_price(),
            priority_fee_gwei: None,
        }
    }
}

/// Gas pricing model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasPricingModel {
    /// Legacy gas pricing (gas price only)
    Legacy,
    /// EIP-1559 (base fee + priority fee)
    #[default]
    Eip1559,
}

impl GasPricingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GasPricingModel::Legacy => "Legacy",
            GasPricingModel::Eip1559 => "Eip1559",
        }
    }
}

/// Settings for reading bridge events from chain logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogScanConfig {
    /// Widest block range per `eth_getLogs` request
    #[serde(default = "default_max_block_span")]
    pub max_block_span: u64,
    /// Minimum gap between log requests (milliseconds)
    #[serde(default = "default_min_request_interval")]
    pub min_request_interval_ms: u64,
    /// First block to scan; defaults to `latest - lookback_blocks`
    #[serde(default)]
    pub start_block: Option<u64>,
    #[serde(default = "default_lookback_blocks")]
    pub lookback_blocks: u64,
}

fn default_max_block_span() -> u64 {
    100
}
fn default_min_request_interval() -> u64 {
    250
}
fn default_lookback_blocks() -> u64 {
    1000
}

impl Default for LogScanConfig {
    fn default() -> Self {
        Self {
            max_block_span: default_max_block_span(),
            min_request_interval_ms: default_min_request_interval(),
            start_block: None,
            lookback_blocks: default_lookback_blocks(),
        }
    }
}

impl LogScanConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}
