use crate::core::{Block, BlockStore, Hash};
use crate::error::Result;
use crate::utils::{deserialize, serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Summary of which blocks a node holds, exchanged during sync so each side can work
/// out what the other is missing. Built fresh from a store every time it is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct HashChain {
    block_hashes: HashSet<Hash>,
}

impl HashChain {
    pub fn from_store(store: &BlockStore) -> HashChain {
        HashChain::from_hashes(store.get_block_hashes())
    }

    pub fn from_hashes<I: IntoIterator<Item = Hash>>(hashes: I) -> HashChain {
        HashChain {
            block_hashes: hashes.into_iter().collect(),
        }
    }

    pub fn from_blocks(blocks: &[Arc<Block>]) -> HashChain {
        HashChain::from_hashes(blocks.iter().map(|block| block.hash()))
    }

    /// Hashes held by `store` that this summary does not list.
    pub fn excluded_hashes(&self, store: &BlockStore) -> Vec<Hash> {
        store
            .get_block_hashes()
            .into_iter()
            .filter(|hash| !self.block_hashes.contains(hash))
            .collect()
    }

    /// Blocks held by `store` that this summary does not list.
    pub fn excluded_blocks(&self, store: &BlockStore) -> Vec<Arc<Block>> {
        self.excluded_hashes(store)
            .iter()
            .map(|hash| {
                let block = store
                    .get_block_with_hash(hash)
                    .expect("a hash enumerated from the store must resolve in the same store");
                Arc::clone(block)
            })
            .collect()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.block_hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.block_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block_hashes.is_empty()
    }

    pub fn block_hashes(&self) -> &HashSet<Hash> {
        &self.block_hashes
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<HashChain> {
        deserialize(bytes)
    }
}
