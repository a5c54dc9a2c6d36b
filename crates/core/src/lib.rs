//! Relayer core logic.
//!
//! This crate provides the relay and liquidation engines:
//! - Configuration loading and the chain registry
//! - Event source with indexer and chain-log backends
//! - Positional token mapping between chains
//! - Bridge processor that turns Locked/Burned events into mints
//! - Liquidation processor with pool discovery and per-pool loops
//! - Orchestrator driving the poll loop, watermarks and retry queue
//!
//! Contract access goes through the traits in `relayer-chain`, so every
//! engine runs against in-memory doubles in tests.

mod bridge;
pub mod config;
mod event_feed;
pub mod liquidation;
mod orchestrator;
mod registry;
mod retry;
mod status;
mod token_mapper;
mod watermark;

#[cfg(test)]
mod testing;

pub use bridge::{BridgeProcessor, MintStatus};
pub use config::{
    ChainConfig, GasConfig, GasPricingModel, LiquidationSettings, LogScanConfig, PoolConfig,
    RelayConfig, Settings,
};
pub use event_feed::{convert_feed_events, EventSource, FeedEventSource};
pub use liquidation::{execute_liquidation, LiquidationPath, LiquidationProcessor, LiquidationResult};
pub use orchestrator::Relayer;
pub use registry::ChainRegistry;
pub use retry::{RetryPolicy, RetryQueue};
pub use status::{ChainStatus, LiquidationStatus, RelayerStatus};
pub use token_mapper::TokenMapper;
pub use watermark::Watermarks;
