//! # Hashchain Node
//!
//! A peer-to-peer proof-of-work node that keeps its forks, tracks balances for
//! whichever block is the tip, and syncs with peers by swapping hash summaries.
//! When I come back to this code, here's what I need to remember:
//!
//! ## What I Built
//! - **Fork-aware block store**: every accepted block is kept, indexed by hash and
//!   by height, and the tallest block is the tip (the first one seen wins a tie)
//! - **Ledger that follows the tip**: when the tip moves I revert the old branch back
//!   to the common ancestor and commit the new one, undoing everything on failure
//! - **Hash-chain sync**: peers exchange the set of block hashes they hold and send
//!   each other only what is missing
//! - **Proof of work**: leading zero hex digits in the header hash, with a cancel
//!   flag so a new tip from the network stops a stale search
//!
//! ## How I Organized My Code
//! - `core/`: hashes, transactions, blocks, the block store, hash chains, mining
//! - `currency/`: transfers, the ledger and the chain that keeps them in step
//! - `network/`: transports (in-process and TCP), the sync protocol and the node
//! - `storage/`: the transaction pool
//! - `signer/`: ECDSA P-256 keys and signatures
//! - `config/`: settings from defaults, a TOML file and the environment
//! - `utils/`: hashing, timestamps and bincode helpers
//! - `cli/`: binary options and the command shell
//!
//! ## When I Need to Understand Something
//! 1. Start with `main.rs` to see how a node is wired together
//! 2. Look at `currency/blockchain.rs` for how the ledger follows reorgs
//! 3. Check `network/protocol.rs` for the sync handshake
//! 4. Review `core/blockchain.rs` for fork tracking

pub mod cli;
pub mod config;
pub mod core;
pub mod currency;
pub mod error;
pub mod network;
pub mod signer;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt, Shell};
pub use config::Config;
pub use core::{
    Block, BlockHeader, BlockStore, BlockValidator, Hash, HashChain, PowMiner, PowValidator,
    Rewarder, StructuralValidator, Transaction,
};
pub use currency::{
    CurrencyBlockChain, HalvingRewarder, HalvingSchedule, LedgerState, MemoryLedgerState, Party,
    RewardValidator, Transfer,
};
pub use error::{BlockchainError, Result};
pub use network::{BCPayload, BlockChainTransport, LocalPeer, Message, MessageType, Node, Peer, Transport};
pub use signer::{PrivateKey, PublicKey, Signature};
pub use storage::TransactionPool;
pub use utils::{current_timestamp, current_timestamp_nanos, sha256_digest};
