//! Test utilities shared by the unit tests

use crate::config::Config;
use crate::core::{Block, BlockStore, Hash, Transaction};
use crate::currency::{Party, Transfer};
use crate::signer::PrivateKey;

/// A signed transaction whose payload is `data` and nothing the ledger understands
pub fn signed_transaction(key: &PrivateKey, data: &str) -> Transaction {
    let mut tx = Transaction::new(data.as_bytes().to_vec());
    tx.sign(key).unwrap();
    tx
}

/// A signed transaction carrying a ledger transfer
pub fn transfer_transaction(key: &PrivateKey, from: Party, to: Party, amount: f64) -> Transaction {
    Transfer::new(from, to, amount).into_transaction(key).unwrap()
}

/// A signed child of `parent`. The nonce is random so siblings with the same
/// transactions still hash differently.
pub fn child_block(parent: &Block, transactions: Vec<Transaction>, key: &PrivateKey) -> Block {
    let mut block = Block::new(parent.get_height() + 1, parent.hash()).unwrap();
    for tx in transactions {
        block.add_transaction(tx);
    }
    block.set_nonce(rand::random());
    block.sign(key).unwrap();
    block
}

/// Extends the store's tip with `tx_count` transactions packed `block_size` per block.
/// Transaction payloads are `{prefix}{i}`. Returns the hashes of the new blocks.
pub fn build_chain(
    store: &mut BlockStore,
    key: &PrivateKey,
    prefix: &str,
    tx_count: usize,
    block_size: usize,
) -> Vec<Hash> {
    let mut added = vec![];
    let txs: Vec<Transaction> = (0..tx_count)
        .map(|i| signed_transaction(key, &format!("{prefix}{i}")))
        .collect();

    for chunk in txs.chunks(block_size.max(1)) {
        let block = child_block(store.get_highest_block(), chunk.to_vec(), key);
        added.push(block.hash());
        store.add_block(block).unwrap();
    }
    added
}

/// Defaults with an easy difficulty and a fixed address
pub fn test_config(addr: &str) -> Config {
    let mut config = Config::default();
    config.set_node_addr(addr.to_string());
    config.set_required_prefix_zeros(1);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_chain_packs_blocks() {
        let key = PrivateKey::generate().unwrap();
        let mut store = BlockStore::new();

        let added = build_chain(&mut store, &key, "t", 7, 3);

        assert_eq!(added.len(), 3);
        assert_eq!(store.height(), 3);
        assert_eq!(store.get_highest_block().get_transactions().len(), 1);
    }

    #[test]
    fn test_sibling_blocks_differ() {
        let key = PrivateKey::generate().unwrap();
        let genesis = Block::genesis();
        let a = child_block(&genesis, vec![], &key);
        let b = child_block(&genesis, vec![], &key);
        assert_ne!(a.hash(), b.hash());
    }
}
