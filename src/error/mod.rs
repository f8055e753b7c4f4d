//! Error handling for the node
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! [`BlockchainError`]. Structural errors (bad parent, bad height, bad balance) are
//! returned to the caller; the network layer logs them and drops the message.

use crate::core::Hash;
use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error types for chain, ledger, mining and network operations
#[derive(Debug, Clone, PartialEq)]
pub enum BlockchainError {
    /// The parent referenced by a block is not in the store
    ParentNotFound(Hash),
    /// A block's height is not its parent's height plus one
    HeightMismatch { expected: u32, found: u32 },
    /// No block with this hash is stored
    BlockNotFound(Hash),
    /// The transaction is not part of the requested chain
    TransactionNotFound(Hash),
    /// The pool already holds a transaction with this hash
    TransactionAlreadyPresent(Hash),
    /// The ledger already tracks this wallet
    WalletAlreadyExists(String),
    /// The ledger has no wallet with this id
    NoSuchWallet(String),
    /// Sender balance is lower than the transferred amount
    InsufficientBalance {
        wallet: String,
        required: f64,
        available: f64,
    },
    /// Amount is negative, NaN or infinite
    InvalidAmount(f64),
    /// Block hash does not carry enough leading zeros
    InsufficientDifficulty { hash: Hash, required_zeros: u8 },
    /// Block failed a structural check
    InvalidBlock(String),
    /// Signature missing or not matching the signed bytes
    InvalidSignature(String),
    /// Payload carried a message kind this node does not speak
    UnknownMessageType(u8),
    /// No peer registered under this address
    PeerNotConnected(String),
    /// Nonce search was interrupted through its cancel flag
    MiningCancelled,
    /// Shell input that doesn't parse as a command
    InvalidCommand(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Network communication errors
    Network(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// A shared lock was poisoned by a panicking holder
    Lock(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::ParentNotFound(hash) => write!(f, "Parent block not found: {hash}"),
            BlockchainError::HeightMismatch { expected, found } => {
                write!(f, "Height mismatch: expected {expected}, found {found}")
            }
            BlockchainError::BlockNotFound(hash) => write!(f, "Block not found: {hash}"),
            BlockchainError::TransactionNotFound(hash) => {
                write!(f, "Transaction not found in chain: {hash}")
            }
            BlockchainError::TransactionAlreadyPresent(hash) => {
                write!(f, "Transaction already present: {hash}")
            }
            BlockchainError::WalletAlreadyExists(id) => write!(f, "Wallet already exists: {id}"),
            BlockchainError::NoSuchWallet(id) => write!(f, "No such wallet: {id}"),
            BlockchainError::InsufficientBalance {
                wallet,
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient balance in {wallet}: required {required}, available {available}"
                )
            }
            BlockchainError::InvalidAmount(amount) => write!(f, "Invalid amount: {amount}"),
            BlockchainError::InsufficientDifficulty {
                hash,
                required_zeros,
            } => {
                write!(
                    f,
                    "Insufficient difficulty: {hash} does not start with {required_zeros} zeros"
                )
            }
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::InvalidSignature(msg) => write!(f, "Invalid signature: {msg}"),
            BlockchainError::UnknownMessageType(kind) => {
                write!(f, "Unknown message type: {kind}")
            }
            BlockchainError::PeerNotConnected(addr) => write!(f, "Peer not connected: {addr}"),
            BlockchainError::MiningCancelled => write!(f, "Mining cancelled"),
            BlockchainError::InvalidCommand(msg) => write!(f, "Invalid command: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Lock(msg) => write!(f, "Lock error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = BlockchainError::HeightMismatch {
            expected: 3,
            found: 5,
        };
        assert_eq!(err.to_string(), "Height mismatch: expected 3, found 5");

        let err = BlockchainError::InsufficientBalance {
            wallet: "alice".to_string(),
            required: 20.0,
            available: 10.0,
        };
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BlockchainError = io.into();
        assert!(matches!(err, BlockchainError::Io(_)));
    }
}
