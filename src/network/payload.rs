use crate::core::{Block, HashChain, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, deserialize_prefix, serialize};
use std::fmt;
use std::sync::Arc;

/// The kinds of sync protocol messages, with their wire discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Transaction = 0,
    HashChain = 1,
    Blocks = 2,
    BlocksWithHashChain = 3,
    WalletId = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = BlockchainError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageType::Transaction),
            1 => Ok(MessageType::HashChain),
            2 => Ok(MessageType::Blocks),
            3 => Ok(MessageType::BlocksWithHashChain),
            4 => Ok(MessageType::WalletId),
            other => Err(BlockchainError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Transaction => "Transaction",
            MessageType::HashChain => "HashChain",
            MessageType::Blocks => "Blocks",
            MessageType::BlocksWithHashChain => "BlocksWithHashChain",
            MessageType::WalletId => "WalletId",
        };
        f.write_str(name)
    }
}

/// A typed protocol payload. `msg_type` stays a raw byte on the wire so an unknown
/// kind still decodes and can be rejected by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct BCPayload {
    msg_type: u8,
    payload: Vec<u8>,
}

impl BCPayload {
    pub fn new(msg_type: MessageType, payload: Vec<u8>) -> BCPayload {
        BCPayload {
            msg_type: msg_type as u8,
            payload,
        }
    }

    pub fn from_raw(msg_type: u8, payload: Vec<u8>) -> BCPayload {
        BCPayload { msg_type, payload }
    }

    pub fn transaction(tx: &Transaction) -> Result<BCPayload> {
        Ok(BCPayload::new(MessageType::Transaction, tx.serialize()?))
    }

    pub fn hash_chain(chain: &HashChain) -> Result<BCPayload> {
        Ok(BCPayload::new(MessageType::HashChain, chain.bytes()?))
    }

    pub fn blocks(blocks: &[Arc<Block>]) -> Result<BCPayload> {
        Ok(BCPayload::new(MessageType::Blocks, encode_blocks(blocks)?))
    }

    // The blocks come first, the hash chain sits right behind them in the same buffer
    pub fn blocks_with_hash_chain(blocks: &[Arc<Block>], chain: &HashChain) -> Result<BCPayload> {
        let mut bytes = encode_blocks(blocks)?;
        bytes.extend(chain.bytes()?);
        Ok(BCPayload::new(MessageType::BlocksWithHashChain, bytes))
    }

    pub fn wallet_id(id: &str) -> Result<BCPayload> {
        Ok(BCPayload::new(MessageType::WalletId, serialize(&id.to_string())?))
    }

    pub fn get_msg_type(&self) -> Result<MessageType> {
        MessageType::try_from(self.msg_type)
    }

    pub fn get_raw_type(&self) -> u8 {
        self.msg_type
    }

    pub fn get_payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn as_transaction(&self) -> Result<Transaction> {
        self.expect_type(MessageType::Transaction)?;
        Transaction::deserialize(&self.payload)
    }

    pub fn as_hash_chain(&self) -> Result<HashChain> {
        self.expect_type(MessageType::HashChain)?;
        HashChain::from_bytes(&self.payload)
    }

    pub fn as_blocks(&self) -> Result<Vec<Block>> {
        self.expect_type(MessageType::Blocks)?;
        deserialize(&self.payload)
    }

    pub fn as_blocks_with_hash_chain(&self) -> Result<(Vec<Block>, HashChain)> {
        self.expect_type(MessageType::BlocksWithHashChain)?;
        let (blocks, consumed) = deserialize_prefix::<Vec<Block>>(&self.payload)?;
        let chain = HashChain::from_bytes(&self.payload[consumed..])?;
        Ok((blocks, chain))
    }

    pub fn as_wallet_id(&self) -> Result<String> {
        self.expect_type(MessageType::WalletId)?;
        deserialize(&self.payload)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<BCPayload> {
        deserialize(bytes)
    }

    fn expect_type(&self, expected: MessageType) -> Result<()> {
        let actual = self.get_msg_type()?;
        if actual != expected {
            return Err(BlockchainError::Serialization(format!(
                "Expected {expected} payload, found {actual}"
            )));
        }
        Ok(())
    }
}

fn encode_blocks(blocks: &[Arc<Block>]) -> Result<Vec<u8>> {
    serialize(&blocks.to_vec())
}
