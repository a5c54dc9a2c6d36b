//! Relayer chain interaction layer.
//!
//! This crate provides:
//! - Contract bindings and traits for the bridge and lending contracts
//! - Read-only RPC client and log-based bridge event fetching
//! - Transaction signing and sending with bounded confirmation waits
//! - Gas strategy abstraction (Legacy + EIP-1559) with fee escalation
//! - Classification of RPC and revert errors
//!
//! Supports multiple EVM chains with configurable RPC endpoints and gas settings.

pub mod contracts;
pub mod errors;
mod events;
pub mod gas;
mod logs;
mod provider;
mod signer;

pub use contracts::{
    BridgeContract, EvmBridge, EvmLending, LendingContract, LiquidatedTokens, LiquidationReceipt,
    MintRequest, TxGas,
};
pub use errors::{classify, classify_error, FailureKind};
pub use events::{BridgeEvent, EventBatch, EventKind};
pub use gas::{GasParams, GasStrategy};
pub use logs::{block_ranges, LogEventFetcher};
pub use provider::ChainClient;
pub use signer::{TransactionSender, TransactionSenderBuilder, TxOutcome};
