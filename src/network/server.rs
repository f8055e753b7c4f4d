use crate::config::Config;
use crate::core::{
    BlockValidator, Hash, HashChain, PowMiner, PowValidator, StructuralValidator, Transaction,
};
use crate::currency::{
    CurrencyBlockChain, HalvingRewarder, MemoryLedgerState, Party, RewardValidator, Transfer,
};
use crate::error::{BlockchainError, Result};
use crate::network::{BCPayload, BlockChainTransport, LocalPeer, Message, Peer, Transport};
use crate::signer::PrivateKey;
use crate::storage::TransactionPool;
use crate::utils::current_timestamp_nanos;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const RECV_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A full node: the chain with its ledger, the transaction pool, the miner and the
/// sync protocol, all owned in one place.
pub struct Node {
    protocol: BlockChainTransport,
    chain: Arc<Mutex<CurrencyBlockChain>>,
    pool: Arc<TransactionPool>,
    miner: PowMiner,
    key: PrivateKey,
    block_tx_limit: usize,
    running: AtomicBool,
    cancel_mining: Arc<AtomicBool>,
}

impl Node {
    pub fn new(config: &Config, transport: Transport) -> Result<Node> {
        let key = PrivateKey::generate()?;
        let zeros = config.get_required_prefix_zeros();

        let chain = Arc::new(Mutex::new(CurrencyBlockChain::new(
            Box::new(MemoryLedgerState::new()),
            config.get_initial_balance(),
        )));
        let pool = Arc::new(TransactionPool::new());

        let rewarder = HalvingRewarder::new(
            key.clone(),
            config.get_initial_reward(),
            config.get_blocks_to_halve_reward(),
        );
        let schedule = rewarder.schedule();
        let miner = PowMiner::new(zeros, Box::new(rewarder));

        let validators: Vec<Box<dyn BlockValidator>> = vec![
            Box::new(StructuralValidator),
            Box::new(PowValidator::new(zeros)),
            Box::new(RewardValidator::new(schedule)),
        ];
        let cancel_mining = Arc::new(AtomicBool::new(false));
        let protocol =
            BlockChainTransport::new(transport, Arc::clone(&chain), Arc::clone(&pool), validators)
                .with_tip_flag(Arc::clone(&cancel_mining));

        info!(
            "Node {} ready with difficulty {zeros}",
            protocol.address()
        );
        Ok(Node {
            protocol,
            chain,
            pool,
            miner,
            key,
            block_tx_limit: config.get_block_tx_limit(),
            running: AtomicBool::new(false),
            cancel_mining,
        })
    }

    pub fn address(&self) -> &str {
        self.protocol.address()
    }

    pub fn connect(&self, peer: Arc<dyn Peer>) {
        info!("{} connected to {}", self.address(), peer.address());
        self.protocol.transport().connect(peer);
    }

    pub fn local_peer(&self) -> LocalPeer {
        self.protocol.transport().local_peer()
    }

    pub fn peers(&self) -> Vec<String> {
        self.protocol.transport().peers()
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    fn lock_chain(&self) -> Result<MutexGuard<'_, CurrencyBlockChain>> {
        self.chain.lock().map_err(|e| {
            error!("Chain lock poisoned: {e}");
            BlockchainError::Lock(format!("Chain lock poisoned: {e}"))
        })
    }

    /// Runs `f` against the chain under its lock
    pub fn with_chain<R>(&self, f: impl FnOnce(&CurrencyBlockChain) -> R) -> Result<R> {
        let chain = self.lock_chain()?;
        Ok(f(&chain))
    }

    pub fn add_wallet(&self, id: &str) -> Result<()> {
        self.lock_chain()?.add_wallet(id)?;
        self.protocol.broadcast_wallet_id(id)?;
        Ok(())
    }

    pub fn wallets(&self) -> Result<Vec<String>> {
        Ok(self.lock_chain()?.get_wallets())
    }

    pub fn balance(&self, id: &str) -> Result<f64> {
        self.lock_chain()?.get_balance(id)
    }

    pub fn balances(&self) -> Result<BTreeMap<String, f64>> {
        Ok(self.lock_chain()?.ledger().balances())
    }

    /// Signs a transfer with the node key, queues it locally and floods it to peers.
    /// The ledger only moves once a block carrying it becomes part of the tip.
    pub fn transact(&self, from: &str, to: &str, amount: f64) -> Result<Hash> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(BlockchainError::InvalidAmount(amount));
        }
        {
            let chain = self.lock_chain()?;
            for id in [from, to] {
                if !chain.ledger().has_wallet(id) {
                    return Err(BlockchainError::NoSuchWallet(id.to_string()));
                }
            }
        }

        let transfer = Transfer::new(Party::wallet(from), Party::wallet(to), amount);
        let mut tx = transfer.into_transaction(&self.key)?;
        tx.set_first_seen(current_timestamp_nanos()?);
        let hash = tx.hash();

        self.pool.add_transaction(tx.clone())?;
        self.protocol.broadcast_transaction(&tx)?;
        info!("Queued transaction {hash}: {transfer}");
        Ok(hash)
    }

    /// Mines one block paying the reward to `wallet`. Pool transactions the tip's
    /// ledger would reject stay out of the block. The nonce search runs without
    /// holding the chain lock and stops early if a message moves the tip meanwhile.
    pub fn mine(&self, wallet: &str) -> Result<Hash> {
        self.cancel_mining.store(false, Ordering::SeqCst);

        let candidate = {
            let mut chain = self.lock_chain()?;
            let pending = self.miner.pending_transactions(chain.store(), &self.pool);
            let selected = chain.applicable_transactions(pending, self.block_tx_limit);
            self.miner.block_from(chain.store(), selected, wallet)?
        };
        let mut block = self
            .miner
            .search_nonce(candidate, Some(self.cancel_mining.as_ref()))?;
        block.sign(&self.key)?;

        StructuralValidator.validate_block(&block)?;
        PowValidator::new(self.miner.required_prefix_zeros()).validate_block(&block)?;

        let hash = block.hash();
        let height = block.get_height();
        self.lock_chain()?.add_block(block)?;
        info!("Added mined block {hash} at height {height}");

        self.protocol.broadcast_hash_chain()?;
        Ok(hash)
    }

    pub fn sync_with(&self, peer: &str) -> Result<()> {
        info!("{} syncing with {peer}", self.address());
        self.protocol.send_hash_chain(peer)
    }

    fn tip(&self) -> Result<Hash> {
        Ok(self.lock_chain()?.store().get_highest_block().hash())
    }

    /// Decodes and dispatches one inbound message. When it moves the tip, the
    /// protocol tells any nonce search in progress to stop.
    pub fn handle_message(&self, message: Message) -> Result<()> {
        let payload = BCPayload::from_bytes(&message.payload)?;
        self.protocol.process_message(&message.from, &payload)
    }

    /// Handles everything already waiting in the inbox and returns how many messages
    /// were taken. Bad messages are logged and dropped.
    pub fn process_pending(&self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.protocol.transport().try_recv() {
            self.dispatch(message);
            handled += 1;
        }
        handled
    }

    fn dispatch(&self, message: Message) {
        let from = message.from.clone();
        if let Err(e) = self.handle_message(message) {
            warn!("Dropping message from {from}: {e}");
        }
    }

    /// Spawns the receive loop. It runs until `kill` is called.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let node = Arc::clone(self);
        thread::spawn(move || {
            info!("{} dispatch loop started", node.address());
            while node.running.load(Ordering::SeqCst) {
                if let Some(message) = node.protocol.transport().recv_timeout(RECV_POLL_INTERVAL)
                {
                    node.dispatch(message);
                }
            }
            info!("{} dispatch loop stopped", node.address());
        })
    }

    pub fn kill(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel_mining.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn height(&self) -> Result<u32> {
        Ok(self.lock_chain()?.height())
    }

    pub fn tip_hash(&self) -> Result<Hash> {
        self.tip()
    }

    pub fn block_hashes(&self) -> Result<Vec<Hash>> {
        Ok(self.lock_chain()?.store().get_block_hashes())
    }

    pub fn hash_chain(&self) -> Result<HashChain> {
        Ok(HashChain::from_store(self.lock_chain()?.store()))
    }

    /// Every transaction on the path from genesis to the tip, oldest first
    pub fn transactions_in_chain(&self) -> Result<Vec<Transaction>> {
        let chain = self.lock_chain()?;
        let tip = chain.store().get_highest_block().hash();
        chain.store().get_transactions_in_chain(&tip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Block, BlockStore};
    use crate::network::MessageType;
    use crate::testnet::test_utils::test_config;

    fn node(addr: &str) -> Node {
        Node::new(&test_config(addr), Transport::new(addr)).unwrap()
    }

    #[test]
    fn test_transact_requires_known_wallets() {
        let node = node("a");
        node.add_wallet("alice").unwrap();

        assert_eq!(
            node.transact("alice", "bob", 1.0),
            Err(BlockchainError::NoSuchWallet("bob".to_string()))
        );
        assert!(matches!(
            node.transact("alice", "alice", -1.0),
            Err(BlockchainError::InvalidAmount(_))
        ));
        assert!(node.pool().is_empty());
    }

    #[test]
    fn test_mine_commits_pool_and_reward() {
        let node = node("a");
        node.add_wallet("alice").unwrap();
        node.add_wallet("bob").unwrap();
        node.transact("alice", "bob", 250.0).unwrap();

        node.mine("miner").unwrap();

        assert_eq!(node.height().unwrap(), 1);
        assert_eq!(node.balance("alice").unwrap(), 9750.0);
        assert_eq!(node.balance("bob").unwrap(), 10250.0);
        assert_eq!(node.balance("miner").unwrap(), 100.0);
        assert_eq!(node.transactions_in_chain().unwrap().len(), 2);
    }

    #[test]
    fn test_mined_transactions_are_not_mined_again() {
        let node = node("a");
        node.add_wallet("alice").unwrap();
        node.add_wallet("bob").unwrap();
        node.transact("alice", "bob", 1.0).unwrap();

        node.mine("miner").unwrap();
        node.mine("miner").unwrap();

        // One transfer plus two rewards
        assert_eq!(node.transactions_in_chain().unwrap().len(), 3);
        assert_eq!(node.balance("bob").unwrap(), 10001.0);
    }

    #[test]
    fn test_tip_change_raises_cancel_flag() {
        let a = node("a");
        let b = node("b");
        b.mine("miner").unwrap();
        a.connect(Arc::new(b.local_peer()));
        b.connect(Arc::new(a.local_peer()));

        a.sync_with("b").unwrap();
        b.process_pending();
        assert!(!a.cancel_mining.load(Ordering::SeqCst));
        a.process_pending();

        assert_eq!(a.height().unwrap(), 1);
        assert!(a.cancel_mining.load(Ordering::SeqCst));
    }

    #[test]
    fn test_undecodable_message_is_dropped() {
        let node = node("a");
        node.local_peer()
            .send_message(&Message::new("b", vec![0xff; 3]))
            .unwrap();

        assert_eq!(node.process_pending(), 1);
        assert_eq!(node.height().unwrap(), 0);
    }

    #[test]
    fn test_listen_and_kill() {
        let node = Arc::new(node("a"));
        let handle = node.listen();
        assert!(node.is_running());

        node.kill();
        handle.join().unwrap();
        assert!(!node.is_running());
    }

    #[test]
    fn test_oversized_length_prefix_is_dropped() {
        let node = node("a");
        let mut bytes = vec![253u8];
        bytes.extend((u64::MAX / 2).to_le_bytes());
        let payload = BCPayload::from_raw(MessageType::Blocks as u8, bytes);
        let wallet = BCPayload::wallet_id("carol").unwrap();
        let peer = node.local_peer();
        peer.send_message(&Message::new("b", payload.to_bytes().unwrap()))
            .unwrap();
        peer.send_message(&Message::new("b", wallet.to_bytes().unwrap()))
            .unwrap();

        // The bad message is dropped and the one behind it still gets handled
        assert_eq!(node.process_pending(), 2);
        assert_eq!(node.height().unwrap(), 0);
        assert_eq!(node.wallets().unwrap(), vec!["carol"]);
    }

    #[test]
    fn test_overdrawn_transfer_does_not_block_mining() {
        let node = node("a");
        node.add_wallet("alice").unwrap();
        node.add_wallet("bob").unwrap();
        let overdraft = node.transact("alice", "bob", 20_000.0).unwrap();
        node.transact("alice", "bob", 5.0).unwrap();

        for _ in 0..3 {
            node.mine("miner").unwrap();
        }

        assert_eq!(node.height().unwrap(), 3);
        assert_eq!(node.balance("alice").unwrap(), 9995.0);
        assert_eq!(node.balance("bob").unwrap(), 10005.0);
        assert!(node
            .transactions_in_chain()
            .unwrap()
            .iter()
            .all(|tx| tx.hash() != overdraft));
        // It stays queued in case a later block funds alice
        assert!(node.pool().contains(&overdraft));
    }

    #[test]
    fn test_own_block_does_not_raise_cancel_flag() {
        let node = node("a");
        node.mine("miner").unwrap();
        assert!(!node.cancel_mining.load(Ordering::SeqCst));
    }

    #[test]
    fn test_inflated_reward_from_peer_is_rejected() {
        let node = node("a");
        let key = PrivateKey::generate().unwrap();
        let genesis = Block::genesis();
        let greedy = HalvingRewarder::new(key.clone(), 1_000_000.0, 10);
        let miner = PowMiner::new(1, Box::new(greedy));
        let store = BlockStore::new();
        let mut block = miner
            .mine_block(&store, &TransactionPool::new(), 10, "thief")
            .unwrap();
        block.sign(&key).unwrap();
        assert_eq!(block.get_parent_hash(), genesis.hash());

        let payload = BCPayload::blocks(&[Arc::new(block)]).unwrap();
        let result = node.handle_message(Message::new("b", payload.to_bytes().unwrap()));

        assert!(matches!(result, Err(BlockchainError::InvalidBlock(_))));
        assert_eq!(node.height().unwrap(), 0);
        assert!(node.balance("thief").is_err());
    }
}
