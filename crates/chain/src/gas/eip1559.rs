//! EIP-1559 gas pricing strategy.

use super::{GasParams, GasStrategy};
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Base fee assumed when the latest block carries none.
const FALLBACK_BASE_FEE: u128 = 30_000_000_000;

/// EIP-1559 gas pricing strategy.
///
/// `max_fee_per_gas = base_fee * multiplier + priority_fee`, capped.
#[derive(Debug)]
pub struct Eip1559GasStrategy {
    /// Priority fee used when the node has no suggestion, in wei.
    default_priority_fee: u128,
    /// Multiplier applied to the base fee.
    max_fee_multiplier: f64,
    /// Cap for `max_fee_per_gas` in wei.
    max_fee_cap: u128,
}

impl Eip1559GasStrategy {
    pub fn new(default_priority_fee: u128, max_fee_multiplier: f64) -> Self {
        Self {
            default_priority_fee,
            max_fee_multiplier,
            max_fee_cap: 500_000_000_000,
        }
    }

    /// Create with a custom max fee cap.
    pub fn with_max_fee_cap(mut self, cap: u128) -> Self {
        self.max_fee_cap = cap;
        self
    }

    fn calculate_max_fee(&self, base_fee: u128, priority_fee: u128) -> u128 {
        let max_fee = ((base_fee as f64) * self.max_fee_multiplier) as u128 + priority_fee;
        max_fee.min(self.max_fee_cap)
    }
}

#[async_trait]
impl GasStrategy for Eip1559GasStrategy {
    async fn fetch_params(&self, rpc_url: &str) -> Result<GasParams> {
        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);

        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to get latest block"))?;

        let base_fee = block
            .header
            .base_fee_per_gas
            .map(|b| b as u128)
            .unwrap_or(FALLBACK_BASE_FEE);

        let priority_fee = provider
            .get_max_priority_fee_per_gas()
            .await
            .unwrap_or(self.default_priority_fee);

        let max_fee_per_gas = self.calculate_max_fee(base_fee, priority_fee);
        debug!(base_fee, priority_fee, max_fee_per_gas, "Fetched EIP-1559 fees");

        Ok(GasParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas: priority_fee.min(max_fee_per_gas),
            base_fee,
        })
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => {
                tx.set_max_fee_per_gas(*max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(*max_priority_fee_per_gas);
            }
            GasParams::Legacy { gas_price } => {
                tx.set_max_fee_per_gas(*gas_price);
                tx.set_max_priority_fee_per_gas(self.default_priority_fee.min(*gas_price));
            }
        }
    }

    fn strategy_name(&self) -> &'static str {
        "EIP-1559"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    #[test]
    fn test_eip1559_max_fee_calculation() {
        let strategy = Eip1559GasStrategy::new(2_000_000_000, 2.0);

        // 30 gwei * 2.0 + 2 gwei
        let max_fee = strategy.calculate_max_fee(30_000_000_000, 2_000_000_000);
        assert_eq!(max_fee, 62_000_000_000);
    }

    #[test]
    fn test_eip1559_max_fee_cap() {
        let strategy =
            Eip1559GasStrategy::new(2_000_000_000, 10.0).with_max_fee_cap(100_000_000_000);

        let max_fee = strategy.calculate_max_fee(30_000_000_000, 2_000_000_000);
        assert_eq!(max_fee, 100_000_000_000);
    }

    #[test]
    fn test_eip1559_apply_escalated_gas() {
        let strategy = Eip1559GasStrategy::new(2_000_000_000, 2.0);
        let mut tx = TransactionRequest::default().with_to(Address::ZERO);

        let params = GasParams::Eip1559 {
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            base_fee: 30_000_000_000,
        }
        .escalated(2);

        strategy.apply_gas(&mut tx, &params);
        assert_eq!(tx.max_fee_per_gas, Some(55_000_000_000));
        assert_eq!(tx.max_priority_fee_per_gas, Some(2_200_000_000));
    }
}
