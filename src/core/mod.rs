//! Core chain functionality
//!
//! Hashes, transactions and blocks, the fork-aware block store, the hash-chain sync
//! summary, block validators and the proof-of-work miner.

pub mod block;
pub mod blockchain;
pub mod hash;
pub mod hash_chain;
pub mod proof_of_work;
pub mod transaction;
pub mod validator;

pub use block::{compute_data_hash, Block, BlockHeader, BLOCK_VERSION};
pub use blockchain::BlockStore;
pub use hash::{Hash, HASH_LEN};
pub use hash_chain::HashChain;
pub use proof_of_work::{meets_difficulty, PowMiner, PowValidator, Rewarder, CANCEL_CHECK_INTERVAL};
pub use transaction::Transaction;
pub use validator::{BlockValidator, StructuralValidator};
