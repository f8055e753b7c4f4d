// This is the currency-aware chain - the block store plus a ledger that always matches the tip
// Whenever a new block becomes the tip I find where the old and new tips branched,
// revert the old branch, commit the new one, and undo everything if any step fails
// Blocks that land on a losing fork never touch the ledger

use crate::core::{Block, BlockStore, Hash, Transaction};
use crate::currency::{LedgerState, Transfer};
use crate::error::{BlockchainError, Result};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Commit,
    Revert,
}

impl Direction {
    fn inverse(self) -> Direction {
        match self {
            Direction::Commit => Direction::Revert,
            Direction::Revert => Direction::Commit,
        }
    }
}

pub struct CurrencyBlockChain {
    store: BlockStore,
    ledger: Box<dyn LedgerState>,
    initial_balance: f64, // What every newly registered wallet starts with
}

impl CurrencyBlockChain {
    pub fn new(ledger: Box<dyn LedgerState>, initial_balance: f64) -> CurrencyBlockChain {
        CurrencyBlockChain {
            store: BlockStore::new(),
            ledger,
            initial_balance,
        }
    }

    // When I already hold blocks (e.g. a copied store) I replay genesis -> tip into the ledger
    pub fn from_store(
        store: BlockStore,
        ledger: Box<dyn LedgerState>,
        initial_balance: f64,
    ) -> Result<CurrencyBlockChain> {
        let mut chain = CurrencyBlockChain {
            store,
            ledger,
            initial_balance,
        };
        let genesis = chain.store.get_genesis().hash();
        let tip = chain.store.get_highest_block().hash();
        chain.commit_path(&tip, &genesis)?;
        Ok(chain)
    }

    pub fn add_block(&mut self, block: Block) -> Result<()> {
        let prev_tip = self.store.get_highest_block().hash();
        let block_hash = block.hash();
        let already_stored = self.store.contains(&block_hash);
        if !already_stored {
            self.check_unique_transactions(&block)?;
        }

        // Linkage errors come straight from the store; the ledger is untouched
        self.store.add_block(block)?;
        if already_stored {
            return Ok(());
        }

        let new_tip = self.store.get_highest_block().hash();
        if new_tip != block_hash {
            debug!("Block {block_hash} extends a fork; ledger unchanged");
            return Ok(());
        }

        // The block won, so the ledger has to follow it. If it can't, the block goes too.
        if let Err(e) = self.update_ledger(&prev_tip, &new_tip) {
            warn!("Rejecting block {block_hash}: {e}");
            self.store.rollback_insertion(&block_hash, &prev_tip);
            return Err(e);
        }
        Ok(())
    }

    // A transaction lands on a chain at most once. A missing parent is left for the
    // store to report.
    fn check_unique_transactions(&self, block: &Block) -> Result<()> {
        let parent = block.get_parent_hash();
        if !self.store.contains(&parent) {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for tx in block.get_transactions() {
            let tx_hash = tx.hash();
            let on_chain = self.store.has_transaction_in_chain(&tx_hash, &parent).is_ok();
            if !seen.insert(tx_hash) || on_chain {
                return Err(BlockchainError::InvalidBlock(format!(
                    "transaction {tx_hash} appears twice on the chain of {}",
                    block.hash()
                )));
            }
        }
        Ok(())
    }

    /// Picks up to `limit` of `candidates`, in order, that the tip's ledger accepts
    /// when applied one after another. The ledger is staged and then restored, so it
    /// ends exactly as it started.
    pub fn applicable_transactions(
        &mut self,
        candidates: Vec<Transaction>,
        limit: usize,
    ) -> Vec<Transaction> {
        let mut selected = vec![];
        let mut staged = vec![];
        for tx in candidates {
            if selected.len() >= limit {
                break;
            }
            if let Some(transfer) = Transfer::from_transaction(&tx) {
                if let Err(e) = self.ledger.commit_transaction(&transfer) {
                    debug!("Leaving transaction {} out of the block: {e}", tx.hash());
                    continue;
                }
                staged.push(transfer);
            }
            selected.push(tx);
        }

        for transfer in staged.iter().rev() {
            if let Err(e) = self.ledger.revert_transaction(transfer) {
                error!("Failed to unstage transfer {}: {e}", transfer.get_id());
            }
        }
        selected
    }

    pub fn add_wallet(&mut self, id: &str) -> Result<()> {
        self.ledger.add_wallet(id, self.initial_balance)?;
        info!("Registered wallet {id} with balance {}", self.initial_balance);
        Ok(())
    }

    pub fn get_balance(&self, id: &str) -> Result<f64> {
        self.ledger.get_balance(id)
    }

    pub fn get_wallets(&self) -> Vec<String> {
        self.ledger.get_wallets()
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn ledger(&self) -> &dyn LedgerState {
        self.ledger.as_ref()
    }

    pub fn height(&self) -> u32 {
        self.store.height()
    }

    fn update_ledger(&mut self, old_tip: &Hash, new_tip: &Hash) -> Result<()> {
        let ancestor = self.common_ancestor(old_tip, new_tip)?;
        self.revert_path(old_tip, &ancestor)?;

        if let Err(e) = self.commit_path(new_tip, &ancestor) {
            // The old branch is already reverted; put it back before giving up
            if let Err(restore) = self.commit_path(old_tip, &ancestor) {
                error!("Failed to restore branch {old_tip} after failed reorg: {restore}");
            }
            return Err(e);
        }

        if ancestor != *old_tip {
            info!("Reorganized ledger from {old_tip} to {new_tip} via {ancestor}");
        }
        Ok(())
    }

    // I build both root-to-tip paths and keep the last hash where they still agree
    pub fn common_ancestor(&self, a: &Hash, b: &Hash) -> Result<Hash> {
        let path_a = self.store.get_path_from_genesis(a)?;
        let path_b = self.store.get_path_from_genesis(b)?;

        let mut ancestor = None;
        for (x, y) in path_a.iter().zip(path_b.iter()) {
            if x != y {
                break;
            }
            ancestor = Some(*x);
        }
        ancestor.ok_or_else(|| {
            BlockchainError::InvalidBlock(format!("{a} and {b} share no ancestor"))
        })
    }

    // Blocks from `tip` back to (not including) `ancestor`, tip first
    fn path_to_ancestor(&self, tip: &Hash, ancestor: &Hash) -> Result<Vec<Arc<Block>>> {
        let mut blocks = vec![];
        let mut current = self.store.get_block_with_hash(tip)?;
        while current.hash() != *ancestor {
            blocks.push(Arc::clone(current));
            if current.get_parent_hash().is_zero() {
                return Err(BlockchainError::InvalidBlock(format!(
                    "{ancestor} is not an ancestor of {tip}"
                )));
            }
            current = self.store.get_prev_block(current)?;
        }
        Ok(blocks)
    }

    fn revert_path(&mut self, old_tip: &Hash, ancestor: &Hash) -> Result<()> {
        let blocks = self.path_to_ancestor(old_tip, ancestor)?;
        self.apply_blocks(&blocks, Direction::Revert)
    }

    fn commit_path(&mut self, new_tip: &Hash, ancestor: &Hash) -> Result<()> {
        let mut blocks = self.path_to_ancestor(new_tip, ancestor)?;
        blocks.reverse();
        self.apply_blocks(&blocks, Direction::Commit)
    }

    // All or nothing over a run of blocks: on failure the blocks already processed are
    // undone, newest first
    fn apply_blocks(&mut self, blocks: &[Arc<Block>], direction: Direction) -> Result<()> {
        for (i, block) in blocks.iter().enumerate() {
            if let Err(e) = self.process_block(block, direction) {
                for done in blocks[..i].iter().rev() {
                    if let Err(undo) = self.process_block(done, direction.inverse()) {
                        error!("Failed to undo block {}: {undo}", done.hash());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    // Same guarantee inside one block. Reverting walks the transactions backwards so each
    // revert sees the balances that followed its commit.
    fn process_block(&mut self, block: &Block, direction: Direction) -> Result<()> {
        let mut transfers: Vec<Transfer> = block
            .get_transactions()
            .iter()
            .filter_map(|tx| {
                let transfer = Transfer::from_transaction(tx);
                if transfer.is_none() {
                    debug!("Transaction {} carries no transfer", tx.hash());
                }
                transfer
            })
            .collect();
        if direction == Direction::Revert {
            transfers.reverse();
        }

        for (i, transfer) in transfers.iter().enumerate() {
            if let Err(e) = self.apply_transfer(transfer, direction) {
                for done in transfers[..i].iter().rev() {
                    if let Err(undo) = self.apply_transfer(done, direction.inverse()) {
                        error!("Failed to undo transfer {}: {undo}", done.get_id());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn apply_transfer(&mut self, transfer: &Transfer, direction: Direction) -> Result<()> {
        match direction {
            Direction::Commit => self.ledger.commit_transaction(transfer),
            Direction::Revert => self.ledger.revert_transaction(transfer),
        }
    }
}
