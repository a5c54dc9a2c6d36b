//! Serializable runtime snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerStatus {
    pub running: bool,
    pub chains: Vec<ChainStatus>,
    pub processed_event_count: usize,
    pub discovered_pool_count: usize,
    pub liquidation: LiquidationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub chain_id: u64,
    pub name: String,
    /// False before the first successful fetch and after a failed one.
    pub connected: bool,
    pub watermark: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub pending_retries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationStatus {
    pub enabled: bool,
    pub running: bool,
    pub configured_pools: usize,
    pub enabled_pools: usize,
    pub active_loops: usize,
}
