//! Settings file loading and validation.
//!
//! The relayer is configured from a single TOML file. `${VAR}` placeholders
//! anywhere in the file are replaced with environment values before parsing,
//! so RPC keys and contract addresses can be kept out of the file.

use super::{ChainConfig, LiquidationSettings, RelayConfig};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

/// Default settings path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/relayer.toml";

/// Complete relayer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub relayer: RelayConfig,
    #[serde(default)]
    pub liquidation: LiquidationSettings,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Load settings from the path in `RELAYER_CONFIG`, or the default path.
    pub fn from_env() -> Result<Self> {
        let path =
            std::env::var("RELAYER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(path)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = expand_env(content);
        let settings: Settings = toml::from_str(&expanded)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the relayer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            bail!("at least one [[chains]] entry is required");
        }

        let mut ids = HashSet::new();
        for chain in &self.chains {
            if !ids.insert(chain.chain_id) {
                bail!("duplicate chain_id {}", chain.chain_id);
            }
            if chain.rpc_url.trim().is_empty() {
                bail!("chain {} has an empty rpc_url", chain.chain_id);
            }
            if chain.logs.max_block_span == 0 {
                bail!("chain {}: logs.max_block_span must be positive", chain.chain_id);
            }
        }

        if self.relayer.poll_interval_ms == 0 {
            bail!("relayer.poll_interval_ms must be positive");
        }
        if self.relayer.max_retries == 0 {
            bail!("relayer.max_retries must be at least 1");
        }
        if self.liquidation.discovery_interval_secs == 0 {
            bail!("liquidation.discovery_interval_secs must be positive");
        }

        let mut pools = HashSet::new();
        for pool in &self.liquidation.pools {
            if !pools.insert(pool.pool_id) {
                bail!("duplicate liquidation pool {}", pool.pool_id);
            }
            if pool.check_interval_ms == 0 {
                bail!("pool {}: check_interval_ms must be positive", pool.pool_id);
            }
        }

        Ok(())
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Log the effective settings.
    pub fn log_config(&self) {
        info!(
            poll_interval_ms = self.relayer.poll_interval_ms,
            max_retries = self.relayer.max_retries,
            retry_backoff_ms = self.relayer.retry_backoff_ms,
            fee_too_low_backoff_ms = self.relayer.fee_too_low_backoff_ms,
            mint_timeout_secs = self.relayer.mint_confirmation_timeout_secs,
            "Relay settings"
        );
        info!(
            enabled = self.liquidation.enabled,
            auto_enable_discovered = self.liquidation.auto_enable_discovered,
            configured_pools = self.liquidation.pools.len(),
            discovery_interval_secs = self.liquidation.discovery_interval_secs,
            "Liquidation settings"
        );
        for chain in &self.chains {
            info!(
                chain_id = chain.chain_id,
                name = %chain.name,
                feed = chain.event_feed_url.is_some(),
                bridge = ?chain.bridge_address,
                lending = ?chain.lending_address,
                tokens = chain.tokens.len(),
                gas = chain.gas.pricing.as_str(),
                "Chain configured"
            );
        }
    }
}

fn env_pattern() -> &'static regex_lite::Regex {
    static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex_lite::Regex::new(r"\$\{([^}]+)\}").expect("valid env pattern"))
}

/// Expand ${VAR_NAME} patterns with environment variable values.
///
/// Unset variables are left in place.
pub fn expand_env(s: &str) -> String {
    env_pattern()
        .replace_all(s, |caps: &regex_lite::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GasPricingModel;

    const SETTINGS: &str = r#"
        [relayer]
        poll_interval_ms = 5000

        [liquidation]
        enabled = true

        [[liquidation.pools]]
        pool_id = 1
        check_interval_ms = 30000

        [[chains]]
        chain_id = 11155111
        name = "Sepolia"
        rpc_url = "https://rpc.sepolia.org"
        event_feed_url = "https://indexer.example/sepolia"
        bridge_address = "0x1111111111111111111111111111111111111111"
        tokens = ["0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"]

        [[chains]]
        chain_id = 80002
        name = "Amoy"
        rpc_url = "https://rpc-amoy.polygon.technology"
        bridge_address = "0x2222222222222222222222222222222222222222"
        lending_address = "0x3333333333333333333333333333333333333333"
        tokens = ["0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"]

        [chains.gas]
        pricing = "Legacy"

        [chains.logs]
        max_block_span = 50
        start_block = 1200
    "#;

    #[test]
    fn test_parse_settings() {
        let settings = Settings::from_toml_str(SETTINGS).unwrap();
        assert_eq!(settings.relayer.poll_interval_ms, 5000);
        assert_eq!(settings.relayer.max_retries, 3);
        assert_eq!(settings.relayer.private_key_env, "RELAYER_PRIVATE_KEY");
        assert_eq!(settings.chains.len(), 2);
        assert_eq!(settings.liquidation.pools[0].pool_id, 1);

        let amoy = settings.chain(80002).unwrap();
        assert_eq!(amoy.gas.pricing, GasPricingModel::Legacy);
        assert_eq!(amoy.logs.max_block_span, 50);
        assert_eq!(amoy.logs.start_block, Some(1200));
        assert!(amoy.event_feed_url.is_none());
        assert!(amoy.has_event_source());
    }

    #[test]
    fn test_env_expansion_in_settings() {
        std::env::set_var("RELAYER_TEST_RPC_KEY", "secret123");
        let toml = SETTINGS.replace(
            "https://rpc.sepolia.org",
            "https://rpc.sepolia.org/${RELAYER_TEST_RPC_KEY}",
        );
        let settings = Settings::from_toml_str(&toml).unwrap();
        assert_eq!(settings.chains[0].rpc_url, "https://rpc.sepolia.org/secret123");
        std::env::remove_var("RELAYER_TEST_RPC_KEY");
    }

    #[test]
    fn test_expand_env() {
        std::env::set_var("LOADER_TEST_VAR", "test_value");
        assert_eq!(expand_env("${LOADER_TEST_VAR}"), "test_value");
        assert_eq!(expand_env("a_${LOADER_TEST_VAR}_b"), "a_test_value_b");
        assert_eq!(expand_env("${LOADER_UNSET_VAR}"), "${LOADER_UNSET_VAR}");
        assert_eq!(expand_env("no_vars"), "no_vars");
        std::env::remove_var("LOADER_TEST_VAR");
    }

    #[test]
    fn test_validation_errors() {
        assert!(Settings::from_toml_str("[relayer]\npoll_interval_ms = 1000").is_err());

        let duplicate = SETTINGS.replace("chain_id = 80002", "chain_id = 11155111");
        let err = Settings::from_toml_str(&duplicate).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate chain_id"));

        let bad_address = SETTINGS.replace(
            "0x2222222222222222222222222222222222222222",
            "0xnot-an-address",
        );
        assert!(Settings::from_toml_str(&bad_address).is_err());

        let zero_retries = SETTINGS.replace("poll_interval_ms = 5000", "max_retries = 0");
        assert!(Settings::from_toml_str(&zero_retries).is_err());
    }
}
