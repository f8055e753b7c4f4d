use crate::core::{Hash, Transaction};
use crate::error::{BlockchainError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Transactions this node has heard of, keyed by content hash.
/// ( K -> content hash, V => Transaction )
pub struct TransactionPool {
    inner: RwLock<HashMap<Hash, Transaction>>,
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts unless a transaction with the same content hash is already held.
    /// The check and the insert happen under one write lock.
    pub fn add_transaction(&self, tx: Transaction) -> Result<()> {
        let mut pool = self.inner.write().map_err(|_| {
            log::error!("Failed to acquire write lock on transaction pool");
            BlockchainError::Lock("transaction pool".to_string())
        })?;

        let hash = tx.hash();
        if pool.contains_key(&hash) {
            return Err(BlockchainError::TransactionAlreadyPresent(hash));
        }
        pool.insert(hash, tx);
        Ok(())
    }

    pub fn get_transaction(&self, hash: &Hash) -> Result<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool
                .get(hash)
                .cloned()
                .ok_or(BlockchainError::TransactionNotFound(*hash)),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction pool");
                Err(BlockchainError::Lock("transaction pool".to_string()))
            }
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.contains_key(hash),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction pool");
                false
            }
        }
    }

    /// Snapshot copy ordered by first-seen time, oldest first. Equal timestamps fall
    /// back to hash order so every call returns the same sequence.
    pub fn transactions(&self) -> Vec<Transaction> {
        match self.inner.read() {
            Ok(pool) => {
                let mut txs: Vec<Transaction> = pool.values().cloned().collect();
                txs.sort_by(|a, b| {
                    a.get_first_seen()
                        .cmp(&b.get_first_seen())
                        .then_with(|| a.hash().cmp(&b.hash()))
                });
                txs
            }
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction pool");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.is_empty(),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction pool");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::PrivateKey;
    use crate::testnet::test_utils::signed_transaction;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_duplicate_is_rejected() {
        let key = PrivateKey::generate().unwrap();
        let pool = TransactionPool::new();
        let tx = signed_transaction(&key, "once");

        pool.add_transaction(tx.clone()).unwrap();
        let result = pool.add_transaction(tx.clone());

        assert_eq!(
            result,
            Err(BlockchainError::TransactionAlreadyPresent(tx.hash()))
        );
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_transactions_ordered_by_first_seen() {
        let key = PrivateKey::generate().unwrap();
        let pool = TransactionPool::new();
        let order = [3, 0, 4, 1, 2];
        for i in order {
            let mut tx = signed_transaction(&key, &format!("tx{i}"));
            tx.set_first_seen(1_000 + i as i64);
            pool.add_transaction(tx).unwrap();
        }

        let seen: Vec<i64> = pool
            .transactions()
            .iter()
            .map(|tx| tx.get_first_seen())
            .collect();
        assert_eq!(seen, vec![1_000, 1_001, 1_002, 1_003, 1_004]);
    }

    #[test]
    fn test_snapshot_is_not_live() {
        let key = PrivateKey::generate().unwrap();
        let pool = TransactionPool::new();
        pool.add_transaction(signed_transaction(&key, "a")).unwrap();

        let snapshot = pool.transactions();
        pool.add_transaction(signed_transaction(&key, "b")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_get_transaction() {
        let key = PrivateKey::generate().unwrap();
        let pool = TransactionPool::new();
        let tx = signed_transaction(&key, "lookup");
        pool.add_transaction(tx.clone()).unwrap();

        assert_eq!(pool.get_transaction(&tx.hash()).unwrap(), tx);
        assert!(pool.contains(&tx.hash()));
        assert!(matches!(
            pool.get_transaction(&Hash::digest(b"absent")),
            Err(BlockchainError::TransactionNotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_inserts_keep_one_copy() {
        let key = PrivateKey::generate().unwrap();
        let pool = Arc::new(TransactionPool::new());
        let tx = signed_transaction(&key, "flooded");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let tx = tx.clone();
                thread::spawn(move || pool.add_transaction(tx).is_ok())
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(pool.len(), 1);
    }
}
