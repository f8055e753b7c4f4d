//! Utility functions and helpers
//!
//! Hashing, ECDSA signing and timestamps live in `crypto`; the bincode 2
//! encode/decode wrappers live in `serialization`.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, current_timestamp_nanos, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, sha256_digest,
};
pub use serialization::{deserialize, deserialize_prefix, serialize, MAX_MESSAGE_BYTES};
