//! Transaction signer and sender for relayed mints and liquidations.
//!
//! One sender exists per chain. Sends are serialized through an async mutex so
//! the locally tracked nonce never races, and every send waits for its receipt
//! with a bounded timeout.

use crate::gas::{create_gas_strategy, GasParams, GasStrategy, LegacyGasStrategy};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Locally tracked account nonce.
pub struct NonceManager {
    current: AtomicU64,
}

impl NonceManager {
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nonce),
        }
    }

    /// Get next nonce and increment counter.
    #[inline]
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    /// Reset nonce to the chain value.
    ///
    /// After a failed or timed out send the pending nonce is reused, so the
    /// next attempt replaces the stuck transaction.
    pub fn reset(&self, chain_nonce: u64) {
        self.current.store(chain_nonce, Ordering::SeqCst);
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub tx_hash: B256,
    /// Receipt status.
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Logs emitted by the transaction, used to parse contract events.
    pub logs: Vec<Log>,
}

/// Transaction sender with configurable gas strategy.
pub struct TransactionSender {
    rpc_url: String,
    wallet: EthereumWallet,
    address: Address,
    chain_id: u64,
    nonce_manager: NonceManager,
    gas_strategy: Box<dyn GasStrategy>,
    send_lock: tokio::sync::Mutex<()>,
}

/// Builder for TransactionSender.
pub struct TransactionSenderBuilder {
    rpc_url: String,
    chain_id: u64,
    gas_strategy: Option<Box<dyn GasStrategy>>,
}

impl TransactionSenderBuilder {
    pub fn new(rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            gas_strategy: None,
        }
    }

    pub fn gas_strategy(mut self, strategy: Box<dyn GasStrategy>) -> Self {
        self.gas_strategy = Some(strategy);
        self
    }

    /// Set gas strategy from chain config parameters.
    pub fn gas_from_config(
        mut self,
        pricing_model: &str,
        default_gas_price_gwei: f64,
        max_gas_price_gwei: f64,
        priority_fee_gwei: Option<f64>,
    ) -> Self {
        self.gas_strategy = Some(create_gas_strategy(
            pricing_model,
            default_gas_price_gwei,
            max_gas_price_gwei,
            priority_fee_gwei,
        ));
        self
    }

    /// Build the sender, fetching the initial nonce from chain.
    pub async fn build(self, private_key: &str) -> Result<TransactionSender> {
        let key_str = private_key.trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str.parse().context("invalid private key")?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let initial_nonce = provider
            .get_transaction_count(address)
            .await
            .with_context(|| format!("fetch nonce on chain {}", self.chain_id))?;

        let gas_strategy = self.gas_strategy.unwrap_or_else(|| {
            Box::new(LegacyGasStrategy::new(
                1_000_000_000,   // 1 gwei default
                100_000_000_000, // 100 gwei max
            ))
        });

        info!(
            address = %address,
            chain_id = self.chain_id,
            initial_nonce,
            gas_strategy = gas_strategy.strategy_name(),
            "Transaction sender initialized"
        );

        Ok(TransactionSender {
            rpc_url: self.rpc_url,
            wallet,
            address,
            chain_id: self.chain_id,
            nonce_manager: NonceManager::new(initial_nonce),
            gas_strategy,
            send_lock: tokio::sync::Mutex::new(()),
        })
    }
}

impl TransactionSender {
    /// Create a sender with Legacy gas pricing.
    pub async fn new(private_key: &str, rpc_url: &str, chain_id: u64) -> Result<Self> {
        TransactionSenderBuilder::new(rpc_url, chain_id)
            .build(private_key)
            .await
    }

    /// Address of the operating wallet.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn gas_strategy_name(&self) -> &'static str {
        self.gas_strategy.strategy_name()
    }

    /// Fetch current fee data through the gas strategy.
    pub async fn fee_params(&self) -> Result<GasParams> {
        self.gas_strategy.fetch_params(&self.rpc_url).await
    }

    /// Estimate gas for a call from the operating wallet.
    pub async fn estimate_gas(&self, to: Address, calldata: Bytes) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(calldata);
        let gas = provider.estimate_gas(tx).await?;
        Ok(gas)
    }

    /// Sign, submit and wait for the receipt.
    ///
    /// A reverted transaction is returned as `success == false`. Submission
    /// errors and a confirmation wait longer than `confirm_timeout` are errors;
    /// both resync the nonce from chain first.
    pub async fn send(
        &self,
        to: Address,
        calldata: Bytes,
        gas_limit: u64,
        fees: &GasParams,
        confirm_timeout: Duration,
    ) -> Result<TxOutcome> {
        let _guard = self.send_lock.lock().await;
        let start = Instant::now();

        let nonce = self.nonce_manager.next();
        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata)
            .with_value(U256::ZERO)
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_chain_id(self.chain_id);
        self.gas_strategy.apply_gas(&mut tx, fees);

        info!(
            chain_id = self.chain_id,
            to = %to,
            nonce,
            gas_limit,
            gas_price_gwei = fees.effective_gas_price_gwei(),
            "Sending transaction"
        );

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.parse()?);

        let pending = match provider.send_transaction(tx).await {
            Ok(pending) => pending,
            Err(e) => {
                self.sync_nonce().await;
                return Err(anyhow::Error::new(e).context("submit transaction"));
            }
        };
        let tx_hash = *pending.tx_hash();
        debug!(chain_id = self.chain_id, tx_hash = %tx_hash, "Transaction submitted, waiting for receipt");

        let receipt = match tokio::time::timeout(confirm_timeout, pending.get_receipt()).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                self.sync_nonce().await;
                return Err(anyhow::Error::new(e).context(format!("await receipt for {tx_hash}")));
            }
            Err(_) => {
                self.sync_nonce().await;
                anyhow::bail!(
                    "confirmation timeout after {}s for {tx_hash}",
                    confirm_timeout.as_secs()
                );
            }
        };

        let success = receipt.status();
        if success {
            info!(
                chain_id = self.chain_id,
                tx_hash = %tx_hash,
                block = receipt.block_number.unwrap_or(0),
                gas_used = receipt.gas_used,
                total_ms = start.elapsed().as_millis(),
                "Transaction confirmed"
            );
        } else {
            warn!(chain_id = self.chain_id, tx_hash = %tx_hash, "Transaction reverted");
        }

        Ok(TxOutcome {
            tx_hash,
            success,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            logs: receipt.inner.logs().to_vec(),
        })
    }

    /// Reset the local nonce to the chain's pending count.
    pub async fn sync_nonce(&self) {
        let provider = match self.rpc_url.parse() {
            Ok(url) => ProviderBuilder::new().on_http(url),
            Err(e) => {
                warn!(error = %e, "Invalid RPC URL, nonce not synced");
                return;
            }
        };
        match provider.get_transaction_count(self.address).await {
            Ok(chain_nonce) => {
                self.nonce_manager.reset(chain_nonce);
                debug!(chain_id = self.chain_id, nonce = chain_nonce, "Nonce synced from chain");
            }
            Err(e) => {
                warn!(chain_id = self.chain_id, error = %e, "Failed to sync nonce from chain");
            }
        }
    }
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("gas_strategy", &self.gas_strategy.strategy_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_manager() {
        let manager = NonceManager::new(10);

        assert_eq!(manager.next(), 10);
        assert_eq!(manager.next(), 11);

        // A failed send rewinds to the chain's pending nonce
        manager.reset(11);
        assert_eq!(manager.next(), 11);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_sender_creation() {
        // Well-known anvil key
        let private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let sender = TransactionSender::new(private_key, "http://127.0.0.1:8545", 31337)
            .await
            .unwrap();

        assert_eq!(
            format!("{:?}", sender.address()).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(sender.gas_strategy_name(), "Legacy");
    }
}
