use crate::core::{Block, BlockValidator, Rewarder, Transaction};
use crate::currency::{Party, Transfer};
use crate::error::{BlockchainError, Result};
use crate::signer::PrivateKey;

/// The mining reward over time: `initial_amount`, halved once every `blocks_to_halve`
/// blocks. A `blocks_to_halve` of zero turns halving off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalvingSchedule {
    initial_amount: f64,
    blocks_to_halve: u32,
}

impl HalvingSchedule {
    pub fn new(initial_amount: f64, blocks_to_halve: u32) -> HalvingSchedule {
        HalvingSchedule {
            initial_amount,
            blocks_to_halve,
        }
    }

    /// Reward for the block built on top of `height`
    pub fn reward_at(&self, height: u32) -> f64 {
        if self.blocks_to_halve == 0 {
            return self.initial_amount;
        }
        let halvings = (height / self.blocks_to_halve).min(i32::MAX as u32) as i32;
        self.initial_amount / 2f64.powi(halvings)
    }
}

/// Pays the scheduled reward to the miner, signed with the node key.
pub struct HalvingRewarder {
    key: PrivateKey,
    schedule: HalvingSchedule,
}

impl HalvingRewarder {
    pub fn new(key: PrivateKey, initial_amount: f64, blocks_to_halve: u32) -> HalvingRewarder {
        HalvingRewarder {
            key,
            schedule: HalvingSchedule::new(initial_amount, blocks_to_halve),
        }
    }

    pub fn schedule(&self) -> HalvingSchedule {
        self.schedule
    }

    pub fn reward_at(&self, height: u32) -> f64 {
        self.schedule.reward_at(height)
    }
}

impl Rewarder for HalvingRewarder {
    fn generate_reward(&self, height: u32, winner: &str) -> Result<Transaction> {
        let transfer = Transfer::new(Party::System, Party::wallet(winner), self.reward_at(height));
        transfer.into_transaction(&self.key)
    }
}

/// Rejects blocks that mint more than the schedule allows: at most one transfer out of
/// the system, paying exactly the reward for the block's height.
#[derive(Debug, Clone, Copy)]
pub struct RewardValidator {
    schedule: HalvingSchedule,
}

impl RewardValidator {
    pub fn new(schedule: HalvingSchedule) -> RewardValidator {
        RewardValidator { schedule }
    }
}

impl BlockValidator for RewardValidator {
    fn validate_block(&self, block: &Block) -> Result<()> {
        let block_hash = block.hash();
        let mints: Vec<Transfer> = block
            .get_transactions()
            .iter()
            .filter_map(Transfer::from_transaction)
            .filter(|transfer| transfer.get_from().is_system())
            .collect();

        if mints.len() > 1 {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {block_hash} mints {} rewards",
                mints.len()
            )));
        }

        let expected = self.schedule.reward_at(block.get_height().saturating_sub(1));
        match mints.first() {
            Some(reward) if reward.get_amount() != expected => {
                Err(BlockchainError::InvalidBlock(format!(
                    "block {block_hash} rewards {} instead of {expected}",
                    reward.get_amount()
                )))
            }
            _ => Ok(()),
        }
    }
}
