// Thin wrappers over bincode 2 so every wire type is encoded with the same configuration
use crate::error::{BlockchainError, Result};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Upper bound on any single decode, and on what one TCP connection may deliver.
/// Length prefixes come from peers, so nothing is allocated past this.
pub const MAX_MESSAGE_BYTES: usize = 32 * 1024 * 1024;

/// Deserialize data using bincode 2.0 with standard configuration, capped at
/// `MAX_MESSAGE_BYTES`
pub fn deserialize<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T> {
    let (data, _) = deserialize_prefix(bytes)?;
    Ok(data)
}

/// Decode one value from the front of `bytes`, returning it with the number of bytes consumed.
/// Used where several encoded values sit back to back in one buffer.
pub fn deserialize_prefix<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<(T, usize)> {
    let config = bincode::config::standard().with_limit::<MAX_MESSAGE_BYTES>();
    bincode::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))
}
