//! Currency on top of the block store
//!
//! Transfers are carried as tagged transaction payloads. The ledger tracks wallet
//! balances for the current tip, and `CurrencyBlockChain` keeps the two in step
//! across forks and reorganizations.

pub mod blockchain;
pub mod ledger_state;
pub mod rewarder;
pub mod transfer;

pub use blockchain::CurrencyBlockChain;
pub use ledger_state::{LedgerState, MemoryLedgerState};
pub use rewarder::{HalvingRewarder, HalvingSchedule, RewardValidator};
pub use transfer::{Party, Transfer, TRANSFER_TAG};
