//! Token address translation between chains.
//!
//! Every chain lists its bridgeable token contracts in the same order, so the
//! n-th token on one chain corresponds to the n-th token on every other chain.

use alloy::primitives::Address;
use std::collections::HashMap;

use crate::registry::ChainRegistry;

/// Positional token table keyed by chain id.
#[derive(Debug, Clone, Default)]
pub struct TokenMapper {
    tokens: HashMap<u64, Vec<Address>>,
}

impl TokenMapper {
    pub fn new(tokens: HashMap<u64, Vec<Address>>) -> Self {
        Self { tokens }
    }

    pub fn from_registry(registry: &ChainRegistry) -> Self {
        Self::new(
            registry
                .chains()
                .iter()
                .map(|c| (c.chain_id, c.tokens.clone()))
                .collect(),
        )
    }

    /// Resolve `source_token` on `source_chain` to its counterpart on `target_chain`.
    ///
    /// Returns `None` if either chain is unknown, the token is not listed on
    /// the source chain, or the target list has no entry at that position.
    /// Addresses are compared as bytes, so hex casing does not matter.
    pub fn map_token_address(
        &self,
        source_chain: u64,
        target_chain: u64,
        source_token: Address,
    ) -> Option<Address> {
        let source = self.tokens.get(&source_chain)?;
        let target = self.tokens.get(&target_chain)?;
        let index = source.iter().position(|t| *t == source_token)?;
        target.get(index).copied()
    }
}
