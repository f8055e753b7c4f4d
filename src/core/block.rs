use crate::core::{Hash, Transaction};
use crate::error::Result;
use crate::signer::{PrivateKey, PublicKey, Signature};
use crate::utils::{current_timestamp, deserialize, serialize};
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use once_cell::sync::OnceCell;
use ring::digest::{Context as DigestContext, SHA256};

pub const BLOCK_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct BlockHeader {
    version: u32,
    data_hash: Hash,
    parent_hash: Hash,
    timestamp: i64,
    height: u32,
    nonce: u64,
}

impl BlockHeader {
    /// Fixed big-endian layout that is hashed for the block id and signed by the validator.
    pub fn bytes(&self) -> Vec<u8> {
        let mut data_bytes = Vec::with_capacity(88);
        data_bytes.extend(self.version.to_be_bytes());
        data_bytes.extend(self.data_hash.as_bytes());
        data_bytes.extend(self.parent_hash.as_bytes());
        data_bytes.extend(self.timestamp.to_be_bytes());
        data_bytes.extend(self.height.to_be_bytes());
        data_bytes.extend(self.nonce.to_be_bytes());
        data_bytes
    }

    pub fn get_version(&self) -> u32 {
        self.version
    }

    pub fn get_data_hash(&self) -> Hash {
        self.data_hash
    }

    pub fn get_parent_hash(&self) -> Hash {
        self.parent_hash
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_height(&self) -> u32 {
        self.height
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }
}

/// A block under construction stays mutable until it is signed. Every mutation goes
/// through a method that drops the memoized hash and any signature, so neither can
/// describe contents the block no longer has.
#[derive(Debug, Clone)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    validator: PublicKey,
    signature: Signature,
    hash: OnceCell<Hash>,
}

impl Block {
    pub fn new(height: u32, parent_hash: Hash) -> Result<Block> {
        Ok(Block::with_timestamp(height, parent_hash, current_timestamp()?))
    }

    pub fn with_timestamp(height: u32, parent_hash: Hash, timestamp: i64) -> Block {
        Block {
            header: BlockHeader {
                version: BLOCK_VERSION,
                data_hash: compute_data_hash(&[]),
                parent_hash,
                timestamp,
                height,
                nonce: 0,
            },
            transactions: vec![],
            validator: PublicKey::default(),
            signature: Signature::default(),
            hash: OnceCell::new(),
        }
    }

    /// The genesis block is identical on every node: no transactions, zero parent,
    /// zero timestamp.
    pub fn genesis() -> Block {
        Block::with_timestamp(0, Hash::zero(), 0)
    }

    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| Hash::digest(&self.header.bytes()))
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
        self.header.data_hash = compute_data_hash(&self.transactions);
        self.invalidate();
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.header.nonce = nonce;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.hash.take();
        self.signature = Signature::default();
        self.validator = PublicKey::default();
    }

    /// Signs the encoded header. The header already carries the data hash, so the
    /// signature covers the transactions too.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<()> {
        self.signature = key.sign(&self.header.bytes())?;
        self.validator = key.public_key().clone();
        Ok(())
    }

    pub fn verify(&self) -> Result<()> {
        self.validator.verify(&self.header.bytes(), &self.signature)
    }

    pub fn data_hash_matches(&self) -> bool {
        self.header.data_hash == compute_data_hash(&self.transactions)
    }

    pub fn has_transaction(&self, tx_hash: &Hash) -> bool {
        self.transactions.iter().any(|tx| tx.hash() == *tx_hash)
    }

    pub fn get_header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn get_height(&self) -> u32 {
        self.header.height
    }

    pub fn get_parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    pub fn get_nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn get_timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_validator(&self) -> &PublicKey {
        &self.validator
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize(bytes)
    }
}

/// Hash over the ordered transaction list: each transaction's content hash, sender
/// key and signature, in block order.
pub fn compute_data_hash(transactions: &[Transaction]) -> Hash {
    let mut context = DigestContext::new(&SHA256);
    context.update(&(transactions.len() as u64).to_be_bytes());
    for tx in transactions {
        context.update(tx.hash().as_bytes());
        let from = tx.get_from().as_bytes();
        context.update(&(from.len() as u32).to_be_bytes());
        context.update(from);
        let signature = tx.get_signature().to_fixed();
        context.update(&(signature.len() as u32).to_be_bytes());
        context.update(&signature);
    }
    let digest = context.finish();
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    Hash::from_bytes(out)
}

impl Encode for Block {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> std::result::Result<(), EncodeError> {
        self.header.encode(encoder)?;
        self.transactions.encode(encoder)?;
        self.validator.encode(encoder)?;
        self.signature.encode(encoder)
    }
}

impl<Context> Decode<Context> for Block {
    fn decode<D: Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        let header: BlockHeader = Decode::decode(decoder)?;
        let transactions: Vec<Transaction> = Decode::decode(decoder)?;
        let validator: PublicKey = Decode::decode(decoder)?;
        let signature: Signature = Decode::decode(decoder)?;
        Ok(Block {
            header,
            transactions,
            validator,
            signature,
            hash: OnceCell::new(),
        })
    }
}
