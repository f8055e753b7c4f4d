use crate::core::{Block, BlockStore, BlockValidator, Hash, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::TransactionPool;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};

/// How many nonces the search tries between looks at the cancel flag.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// True when the hex form of `hash` starts with at least `required_prefix_zeros` zeros.
pub fn meets_difficulty(hash: &Hash, required_prefix_zeros: u8) -> bool {
    let hex = hash.to_hex();
    let zeros = required_prefix_zeros as usize;
    zeros <= hex.len() && hex.bytes().take(zeros).all(|c| c == b'0')
}

/// Produces the reward transaction a miner appends to its block.
pub trait Rewarder: Send + Sync {
    /// `height` is the chain height the new block builds on.
    fn generate_reward(&self, height: u32, winner: &str) -> Result<Transaction>;
}

#[derive(Debug, Clone, Copy)]
pub struct PowValidator {
    required_prefix_zeros: u8,
}

impl PowValidator {
    pub fn new(required_prefix_zeros: u8) -> PowValidator {
        PowValidator {
            required_prefix_zeros,
        }
    }
}

impl BlockValidator for PowValidator {
    fn validate_block(&self, block: &Block) -> Result<()> {
        let hash = block.hash();
        if meets_difficulty(&hash, self.required_prefix_zeros) {
            Ok(())
        } else {
            Err(BlockchainError::InsufficientDifficulty {
                hash,
                required_zeros: self.required_prefix_zeros,
            })
        }
    }
}

pub struct PowMiner {
    required_prefix_zeros: u8,
    rewarder: Box<dyn Rewarder>,
}

impl PowMiner {
    pub fn new(required_prefix_zeros: u8, rewarder: Box<dyn Rewarder>) -> PowMiner {
        PowMiner {
            required_prefix_zeros,
            rewarder,
        }
    }

    pub fn required_prefix_zeros(&self) -> u8 {
        self.required_prefix_zeros
    }

    /// Assembles and mines a block on top of the current tip. The block comes back
    /// unsigned; the caller signs it with its own key.
    pub fn mine_block(
        &self,
        store: &BlockStore,
        pool: &TransactionPool,
        tx_limit: usize,
        miner_wallet: &str,
    ) -> Result<Block> {
        let candidate = self.assemble_block(store, pool, tx_limit, miner_wallet)?;
        self.search_nonce(candidate, None)
    }

    /// Builds the candidate: up to `tx_limit` pool transactions in first-seen order
    /// that the tip's chain does not already contain, then the reward.
    pub fn assemble_block(
        &self,
        store: &BlockStore,
        pool: &TransactionPool,
        tx_limit: usize,
        miner_wallet: &str,
    ) -> Result<Block> {
        let mut selected = self.pending_transactions(store, pool);
        selected.truncate(tx_limit);
        self.block_from(store, selected, miner_wallet)
    }

    /// Pool transactions not yet on the tip's chain, in first-seen order
    pub fn pending_transactions(
        &self,
        store: &BlockStore,
        pool: &TransactionPool,
    ) -> Vec<Transaction> {
        let tip = store.get_highest_block().hash();
        pool.transactions()
            .into_iter()
            .filter(|tx| store.has_transaction_in_chain(&tx.hash(), &tip).is_err())
            .collect()
    }

    /// A candidate on top of the current tip carrying `transactions` followed by the reward
    pub fn block_from(
        &self,
        store: &BlockStore,
        transactions: Vec<Transaction>,
        miner_wallet: &str,
    ) -> Result<Block> {
        let parent_hash = store.get_highest_block().hash();
        let height = store.height();
        let mut block = Block::new(height + 1, parent_hash)?;

        let selected = transactions.len();
        for tx in transactions {
            block.add_transaction(tx);
        }

        let reward = self.rewarder.generate_reward(height, miner_wallet)?;
        block.add_transaction(reward);
        debug!(
            "Assembled block at height {} with {selected} pool transactions",
            height + 1
        );
        Ok(block)
    }

    /// Tries nonces from a random start until the hash meets the difficulty. When a
    /// cancel flag is given it is checked every `CANCEL_CHECK_INTERVAL` attempts.
    pub fn search_nonce(&self, mut block: Block, cancel: Option<&AtomicBool>) -> Result<Block> {
        let mut nonce: u64 = rand::random();
        let mut attempts: u64 = 0;
        loop {
            block.set_nonce(nonce);
            if meets_difficulty(&block.hash(), self.required_prefix_zeros) {
                info!(
                    "Mined block {} at height {} after {attempts} attempts",
                    block.hash(),
                    block.get_height()
                );
                return Ok(block);
            }

            nonce = nonce.wrapping_add(1);
            attempts += 1;
            if attempts % CANCEL_CHECK_INTERVAL == 0 {
                if let Some(flag) = cancel {
                    if flag.load(Ordering::SeqCst) {
                        info!("Mining at height {} cancelled", block.get_height());
                        return Err(BlockchainError::MiningCancelled);
                    }
                }
            }
        }
    }
}
