//! Signing keys and signatures
//!
//! A node signs the blocks it mines and the transactions it creates with an
//! ECDSA P-256 key; peers only ever see the public half.

pub mod keypair;

pub use keypair::{PrivateKey, PublicKey, Signature};
