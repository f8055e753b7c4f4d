// This is the block store - every block my node has accepted, on every fork
// I keep it in memory: a hash index, a height index that allows several blocks per height,
// the fixed genesis block and whichever block currently sits at the top
// Insertion only checks linkage (parent present, height = parent + 1); content checks live in validators

use crate::core::{Block, Hash, Transaction};
use crate::error::{BlockchainError, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

// Clone gives me an independent copy of the indexes that still shares the blocks themselves
#[derive(Debug, Clone)]
pub struct BlockStore {
    blocks: HashMap<Hash, Arc<Block>>,              // Every accepted block, by hash
    blocks_at_height: HashMap<u32, Vec<Arc<Block>>>, // Arrival-ordered blocks per height
    height: u32,                                    // Height of the tip
    highest: Arc<Block>,                            // The tip
    genesis: Arc<Block>,
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore {
    // A fresh store holds only the genesis block, which is also the tip
    pub fn new() -> BlockStore {
        let genesis = Arc::new(Block::genesis());
        let mut blocks = HashMap::new();
        blocks.insert(genesis.hash(), Arc::clone(&genesis));
        let mut blocks_at_height = HashMap::new();
        blocks_at_height.insert(0, vec![Arc::clone(&genesis)]);

        BlockStore {
            blocks,
            blocks_at_height,
            height: 0,
            highest: Arc::clone(&genesis),
            genesis,
        }
    }

    // When a block arrives I link it under its parent. The tip only moves on a strictly
    // greater height, so the first block I see at a height keeps the tip until something
    // taller shows up.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        let block_hash = block.hash();
        if self.blocks.contains_key(&block_hash) {
            debug!("Block {block_hash} already stored");
            return Ok(());
        }

        let parent_hash = block.get_parent_hash();
        let parent = self
            .blocks
            .get(&parent_hash)
            .ok_or(BlockchainError::ParentNotFound(parent_hash))?;

        let expected = parent.get_height().checked_add(1).ok_or_else(|| {
            BlockchainError::InvalidBlock(format!("parent {parent_hash} is at maximum height"))
        })?;
        if block.get_height() != expected {
            return Err(BlockchainError::HeightMismatch {
                expected,
                found: block.get_height(),
            });
        }

        let height = block.get_height();
        let block = Arc::new(block);
        self.blocks.insert(block_hash, Arc::clone(&block));
        self.blocks_at_height
            .entry(height)
            .or_default()
            .push(Arc::clone(&block));

        if height > self.height {
            self.height = height;
            self.highest = block;
            info!("New tip {block_hash} at height {height}");
        } else {
            debug!("Block {block_hash} stored at height {height} without moving the tip");
        }

        Ok(())
    }

    // Only the currency layer calls this, to back out an insertion it could not reconcile.
    // It puts the tip back to where it was before that insertion.
    pub(crate) fn rollback_insertion(&mut self, block_hash: &Hash, previous_tip: &Hash) {
        if let Some(block) = self.blocks.remove(block_hash) {
            let height = block.get_height();
            if let Some(at_height) = self.blocks_at_height.get_mut(&height) {
                at_height.retain(|b| b.hash() != *block_hash);
                if at_height.is_empty() {
                    self.blocks_at_height.remove(&height);
                }
            }
        }
        if let Some(tip) = self.blocks.get(previous_tip) {
            self.height = tip.get_height();
            self.highest = Arc::clone(tip);
        }
    }

    pub fn get_block_with_hash(&self, hash: &Hash) -> Result<&Arc<Block>> {
        self.blocks
            .get(hash)
            .ok_or(BlockchainError::BlockNotFound(*hash))
    }

    pub fn get_prev_block(&self, block: &Block) -> Result<&Arc<Block>> {
        self.get_block_with_hash(&block.get_parent_hash())
    }

    pub fn get_highest_block(&self) -> &Arc<Block> {
        &self.highest
    }

    pub fn get_genesis(&self) -> &Arc<Block> {
        &self.genesis
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks_at_height(&self, height: u32) -> &[Arc<Block>] {
        self.blocks_at_height
            .get(&height)
            .map(|blocks| blocks.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_block_hashes(&self) -> Vec<Hash> {
        self.blocks.keys().copied().collect()
    }

    // I walk parent pointers from the tail down to (but not into) genesis
    pub fn has_transaction_in_chain(&self, tx_hash: &Hash, tail: &Hash) -> Result<()> {
        let mut current = self.get_block_with_hash(tail)?;
        while current.get_height() > 0 {
            if current.has_transaction(tx_hash) {
                return Ok(());
            }
            current = self.get_prev_block(current)?;
        }
        Err(BlockchainError::TransactionNotFound(*tx_hash))
    }

    // Same walk, but I keep every transaction and hand them back oldest block first
    pub fn get_transactions_in_chain(&self, tail: &Hash) -> Result<Vec<Transaction>> {
        let mut blocks = vec![];
        let mut current = self.get_block_with_hash(tail)?;
        while current.get_height() > 0 {
            blocks.push(Arc::clone(current));
            current = self.get_prev_block(current)?;
        }

        Ok(blocks
            .iter()
            .rev()
            .flat_map(|block| block.get_transactions().iter().cloned())
            .collect())
    }

    // Root-to-tip list of hashes ending at `tip`, genesis first
    pub fn get_path_from_genesis(&self, tip: &Hash) -> Result<Vec<Hash>> {
        let mut path = vec![];
        let mut current = self.get_block_with_hash(tip)?;
        loop {
            path.push(current.hash());
            if current.get_parent_hash().is_zero() {
                break;
            }
            current = self.get_prev_block(current)?;
        }
        path.reverse();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::PrivateKey;
    use crate::testnet::test_utils::{build_chain, child_block, signed_transaction};

    #[test]
    fn test_new_store_holds_genesis() {
        let store = BlockStore::new();
        assert_eq!(store.height(), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_highest_block().hash(), Block::genesis().hash());
        assert_eq!(store.get_genesis().hash(), Block::genesis().hash());
    }

    #[test]
    fn test_add_block_links_to_parent() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        let block = child_block(store.get_genesis(), vec![], &key);
        let hash = block.hash();

        store.add_block(block).unwrap();

        assert_eq!(store.height(), 1);
        assert_eq!(store.get_highest_block().hash(), hash);
        let stored = store.get_block_with_hash(&hash).unwrap();
        assert_eq!(store.get_prev_block(stored).unwrap().get_height(), 0);
    }

    #[test]
    fn test_missing_parent_is_rejected_without_mutation() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        let orphan = Block::new(1, Hash::digest(b"nowhere")).unwrap();
        let before = store.get_block_hashes().len();

        let result = store.add_block(orphan);

        assert!(matches!(result, Err(BlockchainError::ParentNotFound(_))));
        assert_eq!(store.get_block_hashes().len(), before);
        assert_eq!(store.height(), 0);

        // Still usable afterwards
        let block = child_block(store.get_genesis(), vec![], &key);
        assert!(store.add_block(block).is_ok());
    }

    #[test]
    fn test_height_skip_is_rejected_without_mutation() {
        let mut store = BlockStore::new();
        let skipping = Block::new(2, store.get_genesis().hash()).unwrap();

        let result = store.add_block(skipping);

        assert_eq!(
            result,
            Err(BlockchainError::HeightMismatch {
                expected: 1,
                found: 2
            })
        );
        assert_eq!(store.len(), 1);
        assert!(store.blocks_at_height(2).is_empty());
    }

    #[test]
    fn test_first_block_at_height_keeps_tip() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        let first = child_block(store.get_genesis(), vec![signed_transaction(&key, "a")], &key);
        let second = child_block(store.get_genesis(), vec![signed_transaction(&key, "b")], &key);
        let first_hash = first.hash();
        let second_hash = second.hash();

        store.add_block(first).unwrap();
        store.add_block(second).unwrap();

        assert_eq!(store.get_highest_block().hash(), first_hash);
        assert_eq!(store.blocks_at_height(1).len(), 2);

        // A taller block on the losing fork takes over
        let parent = Arc::clone(store.get_block_with_hash(&second_hash).unwrap());
        let taller = child_block(&parent, vec![], &key);
        let taller_hash = taller.hash();
        store.add_block(taller).unwrap();
        assert_eq!(store.get_highest_block().hash(), taller_hash);
        assert_eq!(store.height(), 2);
    }

    #[test]
    fn test_adding_known_block_is_idempotent() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        let block = child_block(store.get_genesis(), vec![], &key);

        store.add_block(block.clone()).unwrap();
        store.add_block(block).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.blocks_at_height(1).len(), 1);
    }

    #[test]
    fn test_has_transaction_in_chain_follows_tail() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        let tx = signed_transaction(&key, "on-main");
        let main = child_block(store.get_genesis(), vec![tx.clone()], &key);
        let fork = child_block(store.get_genesis(), vec![], &key);
        let main_hash = main.hash();
        let fork_hash = fork.hash();
        store.add_block(main).unwrap();
        store.add_block(fork).unwrap();

        assert!(store.has_transaction_in_chain(&tx.hash(), &main_hash).is_ok());
        assert!(matches!(
            store.has_transaction_in_chain(&tx.hash(), &fork_hash),
            Err(BlockchainError::TransactionNotFound(_))
        ));
        assert!(matches!(
            store.has_transaction_in_chain(&tx.hash(), &Hash::digest(b"unknown")),
            Err(BlockchainError::BlockNotFound(_))
        ));
    }

    #[test]
    fn test_transactions_in_chain_are_root_first() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        build_chain(&mut store, &key, "tx", 6, 2);

        let tip = store.get_highest_block().hash();
        let txs = store.get_transactions_in_chain(&tip).unwrap();
        let data: Vec<String> = txs
            .iter()
            .map(|tx| String::from_utf8(tx.get_data().to_vec()).unwrap())
            .collect();

        assert_eq!(data, vec!["tx0", "tx1", "tx2", "tx3", "tx4", "tx5"]);
    }

    #[test]
    fn test_height_invariant_over_built_chain() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        build_chain(&mut store, &key, "h", 20, 4);

        for hash in store.get_block_hashes() {
            let block = store.get_block_with_hash(&hash).unwrap();
            if block.get_height() > 0 {
                let parent = store.get_prev_block(block).unwrap();
                assert_eq!(parent.get_height(), block.get_height() - 1);
            }
        }
        assert_eq!(store.height(), 5);
    }

    #[test]
    fn test_copy_is_independent() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        build_chain(&mut store, &key, "base", 4, 2);

        let mut copy = store.clone();
        build_chain(&mut copy, &key, "extra", 2, 1);

        assert_eq!(store.height(), 2);
        assert_eq!(copy.height(), 4);
        assert_eq!(copy.len(), store.len() + 2);
    }

    #[test]
    fn test_path_from_genesis() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        build_chain(&mut store, &key, "p", 3, 1);

        let tip = store.get_highest_block().hash();
        let path = store.get_path_from_genesis(&tip).unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path[0], store.get_genesis().hash());
        assert_eq!(path[3], tip);
    }

    #[test]
    fn test_rollback_insertion_restores_tip() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();
        let previous_tip = store.get_highest_block().hash();
        let block = child_block(store.get_genesis(), vec![], &key);
        let hash = block.hash();
        store.add_block(block).unwrap();

        store.rollback_insertion(&hash, &previous_tip);

        assert!(!store.contains(&hash));
        assert_eq!(store.height(), 0);
        assert_eq!(store.get_highest_block().hash(), previous_tip);
        assert!(store.blocks_at_height(1).is_empty());
    }
}
