//! In-memory storage shared across the node
//!
//! The transaction pool is the one structure every worker touches concurrently, so
//! it carries its own lock.

pub mod memory_pool;

pub use memory_pool::TransactionPool;
