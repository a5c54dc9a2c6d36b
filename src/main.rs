//! NFT Bridge Relayer
//!
//! Multi-chain relayer for a lock/mint NFT bridge with an attached
//! liquidation engine.
//! Features:
//! - Bridge events from a GraphQL indexer with chain-log fallback
//! - Idempotent mints guarded by the target bridge's processed-transaction map
//! - Per-chain watermarks and a retry queue for failed events
//! - Pool discovery and per-pool liquidation loops with batch/auto fallback

use std::collections::HashMap;
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relayer_api::EventFeedClient;
use relayer_chain::{
    BridgeContract, EvmBridge, EvmLending, LendingContract, TransactionSender,
    TransactionSenderBuilder,
};
use relayer_core::{
    ChainConfig, ChainRegistry, FeedEventSource, LiquidationProcessor, Relayer, RetryPolicy,
    Settings,
};

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,relayer_core=debug,relayer_chain=debug")),
        )
        .init();

    // RELAYER_CONFIG selects the settings file
    let settings = Settings::from_env()?;
    settings.log_config();

    let private_key = std::env::var(&settings.relayer.private_key_env).with_context(|| {
        format!("Missing env var: {}", settings.relayer.private_key_env)
    })?;
    let operator = private_key
        .trim_start_matches("0x")
        .parse::<PrivateKeySigner>()
        .context("invalid operator private key")?
        .address();

    let relayer = initialize_components(settings, &private_key, operator).await?;

    relayer.start().await;
    info!("Relayer running, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    relayer.stop();

    let status = serde_json::to_string(&relayer.status())?;
    info!(%status, "Final status");
    Ok(())
}

async fn initialize_components(
    settings: Settings,
    private_key: &str,
    operator: alloy::primitives::Address,
) -> Result<Arc<Relayer>> {
    info!(operator = %operator, "Initializing components...");

    let registry = Arc::new(ChainRegistry::new(settings.chains.clone()));
    let mint_timeout = settings.relayer.mint_confirmation_timeout();
    let liquidation_timeout = settings.liquidation.confirmation_timeout();

    let mut bridges: HashMap<u64, Arc<dyn BridgeContract>> = HashMap::new();
    let mut lenders: HashMap<u64, Arc<dyn LendingContract>> = HashMap::new();

    for chain in registry.chains() {
        if chain.bridge_address.is_none() && chain.lending_address.is_none() {
            continue;
        }

        // A chain whose RPC is down at startup is skipped, not fatal
        let sender = match build_sender(chain, private_key).await {
            Ok(sender) => Arc::new(sender),
            Err(e) => {
                warn!(chain_id = chain.chain_id, error = %format!("{e:#}"), "Skipping chain, sender unavailable");
                continue;
            }
        };

        if let Some(address) = chain.bridge_address {
            bridges.insert(
                chain.chain_id,
                Arc::new(EvmBridge::new(address, Arc::clone(&sender), mint_timeout)),
            );
        } else {
            warn!(chain_id = chain.chain_id, "No bridge address, chain is not a mint target");
        }

        if let Some(address) = chain.lending_address {
            lenders.insert(
                chain.chain_id,
                Arc::new(EvmLending::new(address, Arc::clone(&sender), liquidation_timeout)),
            );
        }

        info!(
            chain_id = chain.chain_id,
            name = %chain.name,
            bridge = chain.bridge_address.is_some(),
            lending = chain.lending_address.is_some(),
            "Chain initialized"
        );
    }

    let source = Arc::new(FeedEventSource::new(EventFeedClient::new(), &registry));

    let mut relayer = Relayer::new(
        Arc::clone(&registry),
        settings.relayer.clone(),
        operator,
        bridges,
        source,
    );

    if !lenders.is_empty() {
        let liquidation = LiquidationProcessor::new(
            settings.liquidation.clone(),
            lenders,
            RetryPolicy::from_config(&settings.relayer),
        );
        relayer = relayer.with_liquidation(Arc::new(liquidation));
    }

    Ok(Arc::new(relayer))
}

async fn build_sender(chain: &ChainConfig, private_key: &str) -> Result<TransactionSender> {
    TransactionSenderBuilder::new(chain.rpc_url.clone(), chain.chain_id)
        .gas_from_config(
            chain.gas.pricing.as_str(),
            chain.gas.default_gas_price_gwei,
            chain.gas.max_gas_price_gwei,
            chain.gas.priority_fee_gwei,
        )
        .build(private_key)
        .await
}

fn print_banner() {
    println!(
        r#"
  ┌─────────────────────────────────────┐
  │          NFT BRIDGE RELAYER         │
  │   lock/mint relay + liquidations    │
  └─────────────────────────────────────┘
"#
    );
}
