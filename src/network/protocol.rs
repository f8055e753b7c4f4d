// The sync protocol sits on top of a plain Transport
// Each node periodically tells its peers which blocks it holds (a HashChain)
// and whoever receives that summary answers with what the sender is missing, plus
// its own summary so the sender can answer back in the same exchange

use crate::core::{Block, BlockValidator, HashChain, Transaction};
use crate::currency::CurrencyBlockChain;
use crate::error::{BlockchainError, Result};
use crate::network::{BCPayload, Message, MessageType, Transport};
use crate::storage::TransactionPool;
use crate::utils::current_timestamp_nanos;
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct BlockChainTransport {
    transport: Transport,
    chain: Arc<Mutex<CurrencyBlockChain>>,
    pool: Arc<TransactionPool>,
    validators: Vec<Box<dyn BlockValidator>>,
    tip_changed: Option<Arc<AtomicBool>>, // Raised whenever inbound blocks move the tip
}

impl BlockChainTransport {
    pub fn new(
        transport: Transport,
        chain: Arc<Mutex<CurrencyBlockChain>>,
        pool: Arc<TransactionPool>,
        validators: Vec<Box<dyn BlockValidator>>,
    ) -> BlockChainTransport {
        BlockChainTransport {
            transport,
            chain,
            pool,
            validators,
            tip_changed: None,
        }
    }

    pub fn with_tip_flag(mut self, flag: Arc<AtomicBool>) -> BlockChainTransport {
        self.tip_changed = Some(flag);
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn address(&self) -> &str {
        self.transport.address()
    }

    fn lock_chain(&self) -> Result<MutexGuard<'_, CurrencyBlockChain>> {
        self.chain.lock().map_err(|e| {
            error!("Chain lock poisoned: {e}");
            BlockchainError::Lock(format!("Chain lock poisoned: {e}"))
        })
    }

    fn hash_chain(&self) -> Result<HashChain> {
        Ok(HashChain::from_store(self.lock_chain()?.store()))
    }

    fn envelope(&self, payload: &BCPayload) -> Result<Message> {
        Ok(Message::new(self.address(), payload.to_bytes()?))
    }

    fn send_payload(&self, to: &str, payload: &BCPayload) -> Result<()> {
        debug!(
            "Sending {} to {to}",
            payload
                .get_msg_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|_| payload.get_raw_type().to_string())
        );
        let message = self.envelope(payload)?;
        self.transport.send_message_to(to, &message)
    }

    fn broadcast_payload(&self, payload: &BCPayload) -> Result<usize> {
        let message = self.envelope(payload)?;
        Ok(self.transport.broadcast(&message))
    }

    pub fn send_transaction(&self, to: &str, tx: &Transaction) -> Result<()> {
        self.send_payload(to, &BCPayload::transaction(tx)?)
    }

    pub fn send_hash_chain(&self, to: &str) -> Result<()> {
        let chain = self.hash_chain()?;
        self.send_payload(to, &BCPayload::hash_chain(&chain)?)
    }

    pub fn send_blocks(&self, to: &str, blocks: &[Arc<Block>]) -> Result<()> {
        self.send_payload(to, &BCPayload::blocks(blocks)?)
    }

    pub fn send_blocks_with_hash_chain(
        &self,
        to: &str,
        blocks: &[Arc<Block>],
        chain: &HashChain,
    ) -> Result<()> {
        self.send_payload(to, &BCPayload::blocks_with_hash_chain(blocks, chain)?)
    }

    pub fn send_wallet_id(&self, to: &str, id: &str) -> Result<()> {
        self.send_payload(to, &BCPayload::wallet_id(id)?)
    }

    pub fn broadcast_transaction(&self, tx: &Transaction) -> Result<usize> {
        self.broadcast_payload(&BCPayload::transaction(tx)?)
    }

    pub fn broadcast_hash_chain(&self) -> Result<usize> {
        let chain = self.hash_chain()?;
        self.broadcast_payload(&BCPayload::hash_chain(&chain)?)
    }

    pub fn broadcast_wallet_id(&self, id: &str) -> Result<usize> {
        self.broadcast_payload(&BCPayload::wallet_id(id)?)
    }

    /// Dispatch one payload received from `from`
    pub fn process_message(&self, from: &str, payload: &BCPayload) -> Result<()> {
        match payload.get_msg_type()? {
            MessageType::Transaction => self.handle_transaction_message(payload.as_transaction()?),
            MessageType::HashChain => self.handle_hash_chain_message(from, payload.as_hash_chain()?),
            MessageType::Blocks => self.handle_blocks_message(payload.as_blocks()?),
            MessageType::BlocksWithHashChain => {
                let (blocks, chain) = payload.as_blocks_with_hash_chain()?;
                self.handle_blocks_with_hash_chain_message(from, blocks, chain)
            }
            MessageType::WalletId => self.handle_wallet_id_message(payload.as_wallet_id()?),
        }
    }

    // Duplicates are normal when transactions flood through the network
    fn handle_transaction_message(&self, mut tx: Transaction) -> Result<()> {
        tx.set_first_seen(current_timestamp_nanos()?);
        match self.pool.add_transaction(tx) {
            Ok(()) => Ok(()),
            Err(BlockchainError::TransactionAlreadyPresent(hash)) => {
                debug!("Transaction {hash} already in pool");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn handle_hash_chain_message(&self, from: &str, remote: HashChain) -> Result<()> {
        let (missing, ours) = {
            let chain = self.lock_chain()?;
            (
                remote.excluded_blocks(chain.store()),
                HashChain::from_store(chain.store()),
            )
        };
        debug!("{from} is missing {} of our blocks", missing.len());
        self.send_blocks_with_hash_chain(from, &missing, &ours)
    }

    fn handle_blocks_message(&self, blocks: Vec<Block>) -> Result<()> {
        self.insert_blocks(blocks)
    }

    fn handle_blocks_with_hash_chain_message(
        &self,
        from: &str,
        blocks: Vec<Block>,
        remote: HashChain,
    ) -> Result<()> {
        self.insert_blocks(blocks)?;

        let missing = {
            let chain = self.lock_chain()?;
            remote.excluded_blocks(chain.store())
        };
        if missing.is_empty() {
            return Ok(());
        }
        debug!("Sending {} blocks back to {from}", missing.len());
        self.send_blocks(from, &missing)
    }

    fn handle_wallet_id_message(&self, id: String) -> Result<()> {
        let mut chain = self.lock_chain()?;
        match chain.add_wallet(&id) {
            Ok(()) => Ok(()),
            Err(BlockchainError::WalletAlreadyExists(id)) => {
                debug!("Wallet {id} already known");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // Parents have to land before their children, so blocks go in by height. The
    // first block that fails stops the batch. The tip is compared under the same lock
    // that inserts, so only these blocks can have moved it.
    fn insert_blocks(&self, mut blocks: Vec<Block>) -> Result<()> {
        blocks.sort_by_key(|block| block.get_height());

        let mut chain = self.lock_chain()?;
        let before = chain.store().get_highest_block().hash();
        let result = self.insert_sorted(&mut chain, blocks);

        let after = chain.store().get_highest_block().hash();
        if after != before {
            info!("Tip is now {after} at height {}", chain.height());
            if let Some(flag) = &self.tip_changed {
                flag.store(true, Ordering::SeqCst);
            }
        }
        result
    }

    fn insert_sorted(&self, chain: &mut CurrencyBlockChain, blocks: Vec<Block>) -> Result<()> {
        let mut added = 0;
        for block in blocks {
            if chain.store().contains(&block.hash()) {
                continue;
            }
            for validator in &self.validators {
                validator.validate_block(&block)?;
            }
            chain.add_block(block)?;
            added += 1;
        }
        if added > 0 {
            debug!("Added {added} blocks");
        }
        Ok(())
    }
}
