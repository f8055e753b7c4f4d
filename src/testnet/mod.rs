//! Test helpers
//!
//! Small builders for signed transactions, child blocks and whole chains so the
//! unit tests across the crate don't each roll their own.

pub mod test_utils;

pub use test_utils::*;
