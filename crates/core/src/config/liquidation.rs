//! Liquidation engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of the liquidation processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Enable pools found by discovery without explicit configuration
    #[serde(default)]
    pub auto_enable_discovered: bool,
    /// Minimum gap between pool discovery runs (seconds)
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,
    /// How long to wait for a liquidation receipt (seconds)
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Explicitly configured pools
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

fn default_discovery_interval() -> u64 {
    300
}
fn default_confirmation_timeout() -> u64 {
    300
}

impl Default for LiquidationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_enable_discovered: false,
            discovery_interval_secs: default_discovery_interval(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            pools: Vec::new(),
        }
    }
}

impl LiquidationSettings {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// Check-and-liquidate settings of one pool, shared by all chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub pool_id: u64,
    /// Upper bound of the token range checked per iteration
    #[serde(default = "default_max_tokens_to_check")]
    pub max_tokens_to_check: u64,
    /// Delay between iterations (milliseconds)
    #[serde(default = "default_check_interval")]
    pub check_interval_ms: u64,
    #[serde(default = "default_pool_enabled")]
    pub enabled: bool,
}

fn default_max_tokens_to_check() -> u64 {
    100
}
fn default_check_interval() -> u64 {
    60_000
}
fn default_pool_enabled() -> bool {
    true
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::discovered(0, default_pool_enabled())
    }
}

impl PoolConfig {
    /// Config given to a pool found by discovery.
    pub fn discovered(pool_id: u64, enabled: bool) -> Self {
        Self {
            pool_id,
            max_tokens_to_check: default_max_tokens_to_check(),
            check_interval_ms: default_check_interval(),
            enabled,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_pool_defaults() {
        let pool = PoolConfig::discovered(4, false);
        assert_eq!(pool.max_tokens_to_check, 100);
        assert_eq!(pool.check_interval(), Duration::from_secs(60));
        assert!(!pool.enabled);
    }

    #[test]
    fn test_pool_from_toml() {
        let pool: PoolConfig = toml::from_str("pool_id = 2\ncheck_interval_ms = 5000").unwrap();
        assert_eq!(pool.pool_id, 2);
        assert!(pool.enabled);
        assert_eq!(pool.max_tokens_to_check, 100);
    }
}
