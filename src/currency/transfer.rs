use crate::core::Transaction;
use crate::error::Result;
use crate::signer::PrivateKey;
use crate::utils::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix that marks a transaction payload as a ledger transfer.
pub const TRANSFER_TAG: &[u8; 4] = b"xfer";

/// One side of a transfer: a wallet, or the system itself when coins are minted
/// (system as sender) or burned (system as receiver).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum Party {
    System,
    Wallet(String),
}

impl Party {
    pub fn wallet(id: impl Into<String>) -> Party {
        Party::Wallet(id.into())
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Party::System)
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::System => f.write_str("<system>"),
            Party::Wallet(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transfer {
    // Random id so two transfers with the same parties and amount hash differently
    id: [u8; 16],
    from: Party,
    to: Party,
    amount: f64,
}

impl Transfer {
    pub fn new(from: Party, to: Party, amount: f64) -> Transfer {
        Transfer {
            id: Uuid::new_v4().into_bytes(),
            from,
            to,
            amount,
        }
    }

    pub fn get_id(&self) -> Uuid {
        Uuid::from_bytes(self.id)
    }

    pub fn get_from(&self) -> &Party {
        &self.from
    }

    pub fn get_to(&self) -> &Party {
        &self.to
    }

    pub fn get_amount(&self) -> f64 {
        self.amount
    }

    /// Same transfer with sender and receiver swapped. Committing it undoes the original.
    pub fn mirrored(&self) -> Transfer {
        Transfer {
            id: self.id,
            from: self.to.clone(),
            to: self.from.clone(),
            amount: self.amount,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = TRANSFER_TAG.to_vec();
        bytes.extend(serialize(self)?);
        Ok(bytes)
    }

    /// `None` for payloads that are not transfers.
    pub fn from_bytes(data: &[u8]) -> Option<Transfer> {
        let body = data.strip_prefix(TRANSFER_TAG.as_slice())?;
        deserialize(body).ok()
    }

    pub fn into_transaction(&self, key: &PrivateKey) -> Result<Transaction> {
        let mut tx = Transaction::new(self.to_bytes()?);
        tx.sign(key)?;
        Ok(tx)
    }

    pub fn from_transaction(tx: &Transaction) -> Option<Transfer> {
        Transfer::from_bytes(tx.get_data())
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.from, self.to, self.amount)
    }
}
