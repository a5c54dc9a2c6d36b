//! Legacy gas pricing strategy (pre-EIP-1559).

use super::{GasParams, GasStrategy};
use alloy::network::TransactionBuilder;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Legacy gas pricing strategy using a single `gas_price`.
#[derive(Debug)]
pub struct LegacyGasStrategy {
    /// Gas price used when the node does not answer, in wei.
    default_gas_price: u128,
    /// Maximum gas price in wei.
    max_gas_price: u128,
}

impl LegacyGasStrategy {
    /// # Arguments
    /// * `default_gas_price` - Fallback gas price in wei
    /// * `max_gas_price` - Cap applied to fetched prices in wei
    pub fn new(default_gas_price: u128, max_gas_price: u128) -> Self {
        Self {
            default_gas_price,
            max_gas_price,
        }
    }

    fn cap(&self, gas_price: u128) -> u128 {
        gas_price.min(self.max_gas_price)
    }
}

#[async_trait]
impl GasStrategy for LegacyGasStrategy {
    async fn fetch_params(&self, rpc_url: &str) -> Result<GasParams> {
        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let gas_price = match provider.get_gas_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(error = %e, default = self.default_gas_price, "Gas price query failed, using default");
                self.default_gas_price
            }
        };

        let gas_price = self.cap(gas_price);
        debug!(gas_price, "Fetched legacy gas price");
        Ok(GasParams::Legacy { gas_price })
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Legacy { gas_price } => {
                tx.set_gas_price(*gas_price);
            }
            GasParams::Eip1559 { max_fee_per_gas, .. } => {
                tx.set_gas_price(*max_fee_per_gas);
            }
        }
    }

    fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    #[test]
    fn test_legacy_cap() {
        let strategy = LegacyGasStrategy::new(1_000_000_000, 10_000_000_000);
        assert_eq!(strategy.cap(5_000_000_000), 5_000_000_000);
        assert_eq!(strategy.cap(20_000_000_000), 10_000_000_000);
    }

    #[test]
    fn test_legacy_apply_gas() {
        let strategy = LegacyGasStrategy::new(1_000_000_000, 10_000_000_000);
        let mut tx = TransactionRequest::default().with_to(Address::ZERO);

        strategy.apply_gas(&mut tx, &GasParams::Legacy { gas_price: 5_000_000_000 });
        assert_eq!(tx.gas_price(), Some(5_000_000_000));

        // Escalated retries carry the bump into the legacy price
        let bumped = GasParams::Legacy { gas_price: 5_000_000_000 }.escalated(3);
        strategy.apply_gas(&mut tx, &bumped);
        assert_eq!(tx.gas_price(), Some(6_000_000_000));
    }
}
