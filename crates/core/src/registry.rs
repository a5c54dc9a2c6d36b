//! Read-only registry of configured chains.

use std::collections::HashMap;

use crate::config::ChainConfig;

/// Chain metadata looked up by chain id.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<ChainConfig>,
    index: HashMap<u64, usize>,
}

impl ChainRegistry {
    /// Build the registry; on duplicate ids the first entry wins.
    pub fn new(chains: Vec<ChainConfig>) -> Self {
        let mut index = HashMap::with_capacity(chains.len());
        for (i, chain) in chains.iter().enumerate() {
            index.entry(chain.chain_id).or_insert(i);
        }
        Self { chains, index }
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.index.get(&chain_id).map(|&i| &self.chains[i])
    }

    /// All chains in configuration order.
    pub fn chains(&self) -> &[ChainConfig] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Chains with a bridge contract.
    pub fn with_bridge(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.iter().filter(|c| c.bridge_address.is_some())
    }
}
