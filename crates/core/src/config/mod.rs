//! Configuration system for the multi-chain relayer.
//!
//! This module provides:
//! - Relay loop timing and retry settings
//! - Chain configuration (RPC endpoints, contracts, tokens, gas, log scanning)
//! - Liquidation settings and per-pool configuration
//! - Settings file loading with environment variable expansion

mod chain;
mod liquidation;
mod loader;
mod relay;

pub use chain::{ChainConfig, GasConfig, GasPricingModel, LogScanConfig};
pub use liquidation::{LiquidationSettings, PoolConfig};
pub use loader::{expand_env, Settings, DEFAULT_CONFIG_PATH};
pub use relay::RelayConfig;
