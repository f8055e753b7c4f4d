use crate::core::Block;
use crate::error::{BlockchainError, Result};

/// A check a block must pass before the node inserts it.
pub trait BlockValidator: Send + Sync {
    fn validate_block(&self, block: &Block) -> Result<()>;
}

/// Checks that a block is internally consistent: the header commits to exactly the
/// transactions it carries, the validator signed the header, and each transaction is
/// signed by its sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl BlockValidator for StructuralValidator {
    fn validate_block(&self, block: &Block) -> Result<()> {
        let block_hash = block.hash();
        if !block.data_hash_matches() {
            return Err(BlockchainError::InvalidBlock(format!(
                "data hash of {block_hash} does not match its transactions"
            )));
        }

        block.verify().map_err(|e| {
            BlockchainError::InvalidSignature(format!("block {block_hash}: {e}"))
        })?;

        for tx in block.get_transactions() {
            tx.verify().map_err(|e| {
                BlockchainError::InvalidSignature(format!(
                    "transaction {} in block {block_hash}: {e}",
                    tx.hash()
                ))
            })?;
        }
        Ok(())
    }
}
