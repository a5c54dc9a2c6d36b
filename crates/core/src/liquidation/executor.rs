//! Single-pool liquidation against one lending contract.

use alloy::primitives::{B256, U256};
use anyhow::{bail, Result};
use relayer_chain::gas::{apply_gas_buffer, LIQUIDATION_GAS_BUFFER_PERCENT};
use relayer_chain::{classify_error, FailureKind, LendingContract, LiquidationReceipt, TxGas};
use tracing::{debug, info, instrument, warn};

use crate::config::PoolConfig;
use crate::retry::RetryPolicy;

/// How an attempt liquidates a pool, decided from the pre-flight checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationPath {
    /// `batchLiquidateAndStartAuctions` on the ids returned by the check.
    Batch { token_ids: Vec<U256>, gas_estimate: u64 },
    /// `autoLiquidatePool` on contracts without the batch interface.
    LegacyFallback,
}

/// Outcome of `execute_liquidation` for one pool on one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidationResult {
    pub success: bool,
    pub liquidated_count: u64,
    pub liquidated_token_ids: Vec<U256>,
    pub transaction_hash: Option<B256>,
    pub error: Option<String>,
}

impl LiquidationResult {
    /// Nothing was liquidated and nothing went wrong.
    pub fn noop() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn from_receipt(receipt: LiquidationReceipt) -> Self {
        let liquidated = receipt.liquidated.unwrap_or_default();
        Self {
            success: true,
            liquidated_count: liquidated.count,
            liquidated_token_ids: liquidated.token_ids,
            transaction_hash: Some(receipt.tx_hash),
            error: None,
        }
    }
}

/// Outcome of one attempt before retry classification.
enum Attempt {
    Done(LiquidationResult),
    Failed(anyhow::Error),
}

/// Liquidate whatever is liquidatable in `pool` on `lending`.
///
/// Never returns an error: every failure ends up in the result.
#[instrument(skip(lending, pool, policy), fields(chain_id = lending.chain_id(), pool_id = pool.pool_id))]
pub async fn execute_liquidation(
    lending: &dyn LendingContract,
    pool: &PoolConfig,
    policy: &RetryPolicy,
) -> LiquidationResult {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match run_attempt(lending, pool, attempt).await {
            Attempt::Done(result) => return result,
            Attempt::Failed(err) => err,
        };

        let kind = classify_error(&err);
        let message = format!("{err:#}");
        if kind == FailureKind::NothingToLiquidate {
            debug!(attempt, "Nothing to liquidate");
            return LiquidationResult::noop();
        }
        if !kind.is_retryable() || attempt >= policy.max_attempts {
            warn!(attempt, kind = %kind, error = %message, "Liquidation failed");
            return LiquidationResult::failure(message);
        }

        let backoff = policy.backoff(kind, attempt);
        warn!(
            attempt,
            kind = %kind,
            backoff_ms = backoff.as_millis() as u64,
            error = %message,
            "Liquidation attempt failed, retrying"
        );
        tokio::time::sleep(backoff).await;
    }
}

async fn run_attempt(lending: &dyn LendingContract, pool: &PoolConfig, attempt: u32) -> Attempt {
    let path = match choose_path(lending, pool).await {
        Ok(Some(path)) => path,
        Ok(None) => return Attempt::Done(LiquidationResult::noop()),
        Err(e) => return Attempt::Failed(e),
    };

    let outcome = match path {
        LiquidationPath::Batch {
            token_ids,
            gas_estimate,
        } => liquidate_batch(lending, pool, &token_ids, gas_estimate, attempt).await,
        LiquidationPath::LegacyFallback => liquidate_auto(lending, pool, attempt).await,
    };

    match outcome {
        Ok(result) => Attempt::Done(result),
        Err(e) => Attempt::Failed(e),
    }
}

/// Decide the path for this attempt. `None` means there is nothing to do.
async fn choose_path(lending: &dyn LendingContract, pool: &PoolConfig) -> Result<Option<LiquidationPath>> {
    if !lending.pool_exists(pool.pool_id).await? {
        debug!("Pool does not exist on this chain");
        return Ok(None);
    }

    let token_ids = match lending
        .check_liquidatable(pool.pool_id, 0, pool.max_tokens_to_check)
        .await
    {
        Ok(ids) => ids,
        Err(e) if classify_error(&e) == FailureKind::MissingFunction => {
            info!("Batch check unavailable, using auto-liquidation");
            return Ok(Some(LiquidationPath::LegacyFallback));
        }
        Err(e) => return Err(e.context("checkLiquidatableCollateral")),
    };

    if token_ids.is_empty() {
        debug!("No liquidatable collateral");
        return Ok(None);
    }

    match lending.estimate_batch_liquidate(pool.pool_id, &token_ids).await {
        Ok(gas_estimate) => Ok(Some(LiquidationPath::Batch {
            token_ids,
            gas_estimate,
        })),
        Err(e) if classify_error(&e) == FailureKind::MissingFunction => {
            info!("Batch liquidation unavailable, using auto-liquidation");
            Ok(Some(LiquidationPath::LegacyFallback))
        }
        Err(e) => Err(e.context("estimate batchLiquidateAndStartAuctions")),
    }
}

async fn gas_for(lending: &dyn LendingContract, estimate: u64, attempt: u32) -> Result<TxGas> {
    let fees = lending.fee_params().await?.escalated(attempt);
    Ok(TxGas {
        gas_limit: apply_gas_buffer(estimate, LIQUIDATION_GAS_BUFFER_PERCENT),
        fees,
    })
}

async fn liquidate_batch(
    lending: &dyn LendingContract,
    pool: &PoolConfig,
    token_ids: &[U256],
    gas_estimate: u64,
    attempt: u32,
) -> Result<LiquidationResult> {
    let gas = gas_for(lending, gas_estimate, attempt).await?;
    info!(
        tokens = token_ids.len(),
        gas_limit = gas.gas_limit,
        gas_price_gwei = gas.fees.effective_gas_price_gwei(),
        attempt,
        "Submitting batch liquidation"
    );

    let receipt = lending
        .submit_batch_liquidate(pool.pool_id, token_ids, &gas)
        .await?;
    finish(receipt)
}

async fn liquidate_auto(
    lending: &dyn LendingContract,
    pool: &PoolConfig,
    attempt: u32,
) -> Result<LiquidationResult> {
    let count = pool.max_tokens_to_check;
    let estimate = match lending.estimate_auto_liquidate(pool.pool_id, 0, count).await {
        Ok(estimate) => estimate,
        Err(e) if classify_error(&e) == FailureKind::NothingToLiquidate => {
            debug!("No eligible positions for auto-liquidation");
            return Ok(LiquidationResult::noop());
        }
        Err(e) => return Err(e.context("estimate autoLiquidatePool")),
    };

    let gas = gas_for(lending, estimate, attempt).await?;
    info!(count, gas_limit = gas.gas_limit, attempt, "Submitting auto-liquidation");

    let receipt = lending
        .submit_auto_liquidate(pool.pool_id, 0, count, &gas)
        .await?;
    finish(receipt)
}

fn finish(receipt: LiquidationReceipt) -> Result<LiquidationResult> {
    if !receipt.success {
        bail!("liquidation transaction {} reverted", receipt.tx_hash);
    }
    if receipt.liquidated.is_none() {
        warn!(tx_hash = %receipt.tx_hash, "Receipt has no liquidation event");
    }
    let result = LiquidationResult::from_receipt(receipt);
    info!(
        tx_hash = ?result.transaction_hash,
        liquidated = result.liquidated_count,
        "Liquidation confirmed"
    );
    Ok(result)
}
