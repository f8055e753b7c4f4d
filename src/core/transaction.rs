// This file implements the transaction - a signed, opaque payload that moves through my network
// The core layer never looks inside the data; the currency layer decides what the bytes mean
// A transaction is identified by the hash of its data alone, so signing it never changes its id

use crate::core::Hash;
use crate::error::Result;
use crate::signer::{PrivateKey, PublicKey, Signature};
use crate::utils::{deserialize, serialize};
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use once_cell::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct Transaction {
    data: Vec<u8>,         // The payload; only its bytes go into the content hash
    from: PublicKey,       // Key of whoever signed the payload
    signature: Signature,  // Signature over the payload bytes
    hash: OnceCell<Hash>,  // I compute the content hash once and keep it
    first_seen: i64,       // Local-only: nanos when my pool first accepted it
}

impl Transaction {
    // When I wrap a payload into a fresh, unsigned transaction
    pub fn new(data: Vec<u8>) -> Transaction {
        Transaction {
            data,
            from: PublicKey::default(),
            signature: Signature::default(),
            hash: OnceCell::new(),
            first_seen: 0,
        }
    }

    // Signing records my public key as the sender and signs the raw payload bytes
    pub fn sign(&mut self, key: &PrivateKey) -> Result<()> {
        self.signature = key.sign(&self.data)?;
        self.from = key.public_key().clone();
        Ok(())
    }

    pub fn verify(&self) -> Result<()> {
        self.from.verify(&self.data, &self.signature)
    }

    // The data never changes after construction, so the cached value can't go stale
    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| Hash::digest(&self.data))
    }

    pub fn get_data(&self) -> &[u8] {
        self.data.as_slice()
    }

    pub fn get_from(&self) -> &PublicKey {
        &self.from
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }

    pub fn get_first_seen(&self) -> i64 {
        self.first_seen
    }

    // The pool stamps this when it accepts the transaction, never the creator
    pub fn set_first_seen(&mut self, first_seen: i64) {
        self.first_seen = first_seen;
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}

// Equality ignores first_seen: two nodes see the same transaction at different times
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.from == other.from && self.signature == other.signature
    }
}

impl Eq for Transaction {}

// Wire layout: data, sender key, signature. The cached hash and first_seen stay local.
impl Encode for Transaction {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> std::result::Result<(), EncodeError> {
        self.data.encode(encoder)?;
        self.from.encode(encoder)?;
        self.signature.encode(encoder)
    }
}

impl<Context> Decode<Context> for Transaction {
    fn decode<D: Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        let data: Vec<u8> = Decode::decode(decoder)?;
        let from: PublicKey = Decode::decode(decoder)?;
        let signature: Signature = Decode::decode(decoder)?;
        Ok(Transaction {
            data,
            from,
            signature,
            hash: OnceCell::new(),
            first_seen: 0,
        })
    }
}
