//! Relay loop and retry configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of the relay loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Delay between poll iterations (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Attempts per mint or liquidation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff unit for transient failures (milliseconds)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Backoff unit after "replacement fee too low" (milliseconds)
    #[serde(default = "default_fee_too_low_backoff")]
    pub fee_too_low_backoff_ms: u64,
    /// How long to wait for a mint receipt (seconds)
    #[serde(default = "default_mint_confirmation_timeout")]
    pub mint_confirmation_timeout_secs: u64,
    /// Environment variable holding the operator private key
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

fn default_poll_interval() -> u64 {
    15_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    2_000
}
fn default_fee_too_low_backoff() -> u64 {
    5_000
}
fn default_mint_confirmation_timeout() -> u64 {
    120
}
fn default_private_key_env() -> String {
    "RELAYER_PRIVATE_KEY".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            fee_too_low_backoff_ms: default_fee_too_low_backoff(),
            mint_confirmation_timeout_secs: default_mint_confirmation_timeout(),
            private_key_env: default_private_key_env(),
        }
    }
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn fee_too_low_backoff(&self) -> Duration {
        Duration::from_millis(self.fee_too_low_backoff_ms)
    }

    pub fn mint_confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.mint_confirmation_timeout_secs)
    }
}
