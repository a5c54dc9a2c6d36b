//! Gas pricing for relayed transactions.
//!
//! Chains either price transactions with a single legacy gas price or with
//! EIP-1559 base/priority fees. Both are fetched through a [`GasStrategy`]
//! selected from chain configuration. Retried submissions escalate the fetched
//! fees so that a replacement for a stuck transaction is accepted by the
//! mempool.
//!
//! # Example
//!
//! ```rust,ignore
//! use relayer_chain::gas::{create_gas_strategy, apply_gas_buffer};
//!
//! let strategy = create_gas_strategy("Eip1559", 30.0, 500.0, Some(2.0));
//! let fees = strategy.fetch_params(rpc_url).await?.escalated(attempt);
//! let gas_limit = apply_gas_buffer(estimate, 50);
//! ```

mod eip1559;
mod legacy;

pub use eip1559::Eip1559GasStrategy;
pub use legacy::LegacyGasStrategy;

use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Percentage added on top of the mint gas estimate.
pub const MINT_GAS_BUFFER_PERCENT: u64 = 20;

/// Percentage added on top of liquidation gas estimates.
pub const LIQUIDATION_GAS_BUFFER_PERCENT: u64 = 50;

/// Fee increase per retry attempt, in percent.
const ESCALATION_STEP_PERCENT: u64 = 10;

/// Gas parameters fetched from the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasParams {
    /// Legacy gas pricing (pre-EIP-1559).
    Legacy {
        /// Gas price in wei.
        gas_price: u128,
    },
    /// EIP-1559 gas pricing.
    Eip1559 {
        /// Maximum fee per gas in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas in wei.
        max_priority_fee_per_gas: u128,
        /// Base fee of the latest block.
        base_fee: u128,
    },
}

impl GasParams {
    /// Get the effective gas price for logging and cost estimates.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }

    /// Effective gas price in whole gwei.
    pub fn effective_gas_price_gwei(&self) -> u128 {
        self.effective_gas_price() / 1_000_000_000
    }

    /// Scale every fee field for the given 1-based attempt number.
    ///
    /// Attempt 1 keeps the fetched fees, attempt k pays `100 + (k-1)*10`
    /// percent of them.
    pub fn escalated(&self, attempt: u32) -> GasParams {
        let percent = fee_escalation_percent(attempt) as u128;
        let scale = |value: u128| value.saturating_mul(percent) / 100;

        match self {
            GasParams::Legacy { gas_price } => GasParams::Legacy {
                gas_price: scale(*gas_price),
            },
            GasParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                base_fee,
            } => GasParams::Eip1559 {
                max_fee_per_gas: scale(*max_fee_per_gas),
                max_priority_fee_per_gas: scale(*max_priority_fee_per_gas),
                base_fee: scale(*base_fee),
            },
        }
    }
}

/// Fee multiplier in percent for a 1-based attempt number.
pub fn fee_escalation_percent(attempt: u32) -> u64 {
    100 + u64::from(attempt.saturating_sub(1)) * ESCALATION_STEP_PERCENT
}

/// Add `buffer_percent` on top of a gas estimate.
pub fn apply_gas_buffer(estimate: u64, buffer_percent: u64) -> u64 {
    estimate.saturating_mul(100 + buffer_percent) / 100
}

/// Trait for gas pricing strategies.
#[async_trait]
pub trait GasStrategy: Send + Sync + Debug {
    /// Fetch current gas parameters from the given RPC URL.
    async fn fetch_params(&self, rpc_url: &str) -> Result<GasParams>;

    /// Apply gas parameters to a transaction request.
    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams);

    /// Strategy name for logging.
    fn strategy_name(&self) -> &'static str;
}

/// Create a gas strategy from chain configuration.
///
/// # Arguments
/// * `pricing_model` - "Legacy" or "Eip1559"
/// * `default_gas_price_gwei` - Fallback gas price in gwei when the node gives none
/// * `max_gas_price_gwei` - Cap applied to fetched prices in gwei
/// * `priority_fee_gwei` - Fallback priority fee in gwei (EIP-1559 only)
pub fn create_gas_strategy(
    pricing_model: &str,
    default_gas_price_gwei: f64,
    max_gas_price_gwei: f64,
    priority_fee_gwei: Option<f64>,
) -> Box<dyn GasStrategy> {
    match pricing_model.to_lowercase().as_str() {
        "eip1559" | "eip-1559" => {
            let priority_fee = priority_fee_gwei.unwrap_or(2.0);
            Box::new(
                Eip1559GasStrategy::new((priority_fee * 1e9) as u128, 2.0)
                    .with_max_fee_cap((max_gas_price_gwei * 1e9) as u128),
            )
        }
        _ => Box::new(LegacyGasStrategy::new(
            (default_gas_price_gwei * 1e9) as u128,
            (max_gas_price_gwei * 1e9) as u128,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_params_effective_price() {
        let legacy = GasParams::Legacy {
            gas_price: 1_000_000_000,
        };
        assert_eq!(legacy.effective_gas_price(), 1_000_000_000);

        let eip1559 = GasParams::Eip1559 {
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            base_fee: 30_000_000_000,
        };
        assert_eq!(eip1559.effective_gas_price(), 50_000_000_000);
    }

    #[test]
    fn test_effective_gas_price_gwei_keeps_full_range() {
        let fees = GasParams::Legacy {
            gas_price: 20_000_000_000_000_000_000_000,
        };
        assert!(fees.effective_gas_price() > u128::from(u64::MAX));
        assert_eq!(fees.effective_gas_price_gwei(), 20_000_000_000_000);

        let fees = GasParams::Eip1559 {
            max_fee_per_gas: 55_500_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            base_fee: 26_000_000_000,
        };
        assert_eq!(fees.effective_gas_price_gwei(), 55);
    }

    #[test]
    fn test_fee_escalation_percent() {
        assert_eq!(fee_escalation_percent(1), 100);
        assert_eq!(fee_escalation_percent(2), 110);
        assert_eq!(fee_escalation_percent(3), 120);
        // Attempt 0 is treated like the first attempt
        assert_eq!(fee_escalation_percent(0), 100);
    }

    #[test]
    fn test_escalated_params() {
        let fees = GasParams::Eip1559 {
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            base_fee: 30_000_000_000,
        };

        assert_eq!(fees.escalated(1), fees);
        assert_eq!(
            fees.escalated(3),
            GasParams::Eip1559 {
                max_fee_per_gas: 60_000_000_000,
                max_priority_fee_per_gas: 2_400_000_000,
                base_fee: 36_000_000_000,
            }
        );

        let legacy = GasParams::Legacy { gas_price: 1_000 };
        assert_eq!(legacy.escalated(2), GasParams::Legacy { gas_price: 1_100 });
    }

    #[test]
    fn test_apply_gas_buffer() {
        assert_eq!(apply_gas_buffer(100_000, MINT_GAS_BUFFER_PERCENT), 120_000);
        assert_eq!(apply_gas_buffer(100_000, LIQUIDATION_GAS_BUFFER_PERCENT), 150_000);
        assert_eq!(apply_gas_buffer(0, 50), 0);
    }

    #[test]
    fn test_create_gas_strategy() {
        let legacy = create_gas_strategy("Legacy", 1.0, 10.0, None);
        assert_eq!(legacy.strategy_name(), "Legacy");

        let eip1559 = create_gas_strategy("Eip1559", 30.0, 500.0, Some(2.0));
        assert_eq!(eip1559.strategy_name(), "EIP-1559");

        let unknown = create_gas_strategy("Unknown", 1.0, 10.0, None);
        assert_eq!(unknown.strategy_name(), "Legacy");
    }
}
