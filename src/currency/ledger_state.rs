use crate::currency::{Party, Transfer};
use crate::error::{BlockchainError, Result};
use std::collections::{BTreeMap, HashMap};

/// Wallet balances driven by the transfers on the canonical chain.
pub trait LedgerState: Send {
    fn has_wallet(&self, id: &str) -> bool;

    fn add_wallet(&mut self, id: &str, initial_balance: f64) -> Result<()>;

    fn get_balance(&self, id: &str) -> Result<f64>;

    fn get_wallets(&self) -> Vec<String>;

    /// Every wallet with its balance, ordered by wallet id.
    fn balances(&self) -> BTreeMap<String, f64>;

    fn commit_transaction(&mut self, transfer: &Transfer) -> Result<()>;

    fn revert_transaction(&mut self, transfer: &Transfer) -> Result<()> {
        self.commit_transaction(&transfer.mirrored())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerState {
    balance: HashMap<String, f64>,
}

impl MemoryLedgerState {
    pub fn new() -> MemoryLedgerState {
        MemoryLedgerState::default()
    }

    fn credit(&mut self, id: &str, amount: f64) {
        *self.balance.entry(id.to_string()).or_insert(0.0) += amount;
    }

    fn debit(&mut self, id: &str, amount: f64) {
        *self.balance.entry(id.to_string()).or_insert(0.0) -= amount;
    }
}

impl LedgerState for MemoryLedgerState {
    fn has_wallet(&self, id: &str) -> bool {
        self.balance.contains_key(id)
    }

    fn add_wallet(&mut self, id: &str, initial_balance: f64) -> Result<()> {
        if self.has_wallet(id) {
            return Err(BlockchainError::WalletAlreadyExists(id.to_string()));
        }
        self.balance.insert(id.to_string(), initial_balance);
        Ok(())
    }

    fn get_balance(&self, id: &str) -> Result<f64> {
        self.balance
            .get(id)
            .copied()
            .ok_or_else(|| BlockchainError::NoSuchWallet(id.to_string()))
    }

    fn get_wallets(&self) -> Vec<String> {
        let mut wallets: Vec<String> = self.balance.keys().cloned().collect();
        wallets.sort();
        wallets
    }

    fn balances(&self) -> BTreeMap<String, f64> {
        self.balance
            .iter()
            .map(|(id, amount)| (id.clone(), *amount))
            .collect()
    }

    // Minting and burning skip every check; a wallet-to-wallet transfer needs both
    // wallets and enough balance on the sender
    fn commit_transaction(&mut self, transfer: &Transfer) -> Result<()> {
        let amount = transfer.get_amount();
        if !amount.is_finite() || amount < 0.0 {
            return Err(BlockchainError::InvalidAmount(amount));
        }

        match (transfer.get_from(), transfer.get_to()) {
            (Party::System, Party::System) => Ok(()),
            (Party::System, Party::Wallet(to)) => {
                self.credit(to, amount);
                Ok(())
            }
            (Party::Wallet(from), Party::System) => {
                self.debit(from, amount);
                Ok(())
            }
            (Party::Wallet(from), Party::Wallet(to)) => {
                if !self.has_wallet(to) {
                    return Err(BlockchainError::NoSuchWallet(to.clone()));
                }
                let available = self.get_balance(from)?;
                if available < amount {
                    return Err(BlockchainError::InsufficientBalance {
                        wallet: from.clone(),
                        required: amount,
                        available,
                    });
                }
                self.debit(from, amount);
                self.credit(to, amount);
                Ok(())
            }
        }
    }
}
