//! Node sync integration tests
//!
//! Whole nodes talking to each other: in-process through local peers, and once over
//! real TCP sockets on loopback.

use hashchain_node::network::{Node, Peer, TcpPeer, Transport};
use hashchain_node::{Config, Result};
use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn config(addr: &str, block_tx_limit: usize) -> Config {
    let mut config = Config::default();
    config.set_node_addr(addr.to_string());
    config.set_required_prefix_zeros(1);
    config.set_block_tx_limit(block_tx_limit);
    config
}

fn local_node(addr: &str, block_tx_limit: usize) -> Node {
    Node::new(&config(addr, block_tx_limit), Transport::new(addr)).unwrap()
}

fn link(a: &Node, b: &Node) {
    a.connect(Arc::new(b.local_peer()));
    b.connect(Arc::new(a.local_peer()));
}

/// Lets both nodes handle their inboxes until neither has anything left
fn settle(nodes: &[&Node]) {
    loop {
        let handled: usize = nodes.iter().map(|node| node.process_pending()).sum();
        if handled == 0 {
            break;
        }
    }
}

fn hash_set(node: &Node) -> HashSet<hashchain_node::Hash> {
    node.block_hashes().unwrap().into_iter().collect()
}

#[test]
fn test_empty_node_catches_up() {
    let a = local_node("node-a", 5);
    let b = local_node("node-b", 5);
    for node in [&a, &b] {
        node.add_wallet("alice").unwrap();
        node.add_wallet("bob").unwrap();
    }

    // 100 transactions, 5 per block
    for _ in 0..100 {
        a.transact("alice", "bob", 1.0).unwrap();
    }
    for _ in 0..20 {
        a.mine("miner").unwrap();
    }
    assert_eq!(a.height().unwrap(), 20);
    assert_eq!(b.height().unwrap(), 0);

    link(&a, &b);
    b.sync_with("node-a").unwrap();

    // a answers with everything b lacks plus its own summary
    assert_eq!(a.process_pending(), 1);
    // b inserts the blocks and has nothing a is missing, so it stays quiet
    assert_eq!(b.process_pending(), 1);
    assert_eq!(a.process_pending(), 0);

    assert_eq!(hash_set(&a).len(), 21);
    assert_eq!(hash_set(&b), hash_set(&a));
    assert_eq!(b.tip_hash().unwrap(), a.tip_hash().unwrap());
    assert_eq!(b.balances().unwrap(), a.balances().unwrap());
    assert_eq!(b.balance("bob").unwrap(), 10100.0);
}

#[test]
fn test_divergent_chains_converge() {
    let a = local_node("node-a", 10);
    let b = local_node("node-b", 10);

    for _ in 0..3 {
        a.mine("miner-a").unwrap();
    }
    for _ in 0..2 {
        b.mine("miner-b").unwrap();
    }

    link(&a, &b);
    b.sync_with("node-a").unwrap();
    settle(&[&a, &b]);

    // Every block ends up on both sides and the taller branch is the tip everywhere
    assert_eq!(hash_set(&a).len(), 6);
    assert_eq!(hash_set(&a), hash_set(&b));
    assert_eq!(a.tip_hash().unwrap(), b.tip_hash().unwrap());
    assert_eq!(a.height().unwrap(), 3);

    // b reverted its own rewards when it switched branches
    assert_eq!(b.balance("miner-b").unwrap(), 0.0);
    assert_eq!(b.balance("miner-a").unwrap(), a.balance("miner-a").unwrap());
}

#[test]
fn test_transactions_and_wallets_gossip() {
    let a = local_node("node-a", 10);
    let b = local_node("node-b", 10);
    link(&a, &b);

    a.add_wallet("alice").unwrap();
    a.add_wallet("bob").unwrap();
    settle(&[&a, &b]);
    assert_eq!(b.wallets().unwrap(), vec!["alice", "bob"]);

    let hash = a.transact("alice", "bob", 7.0).unwrap();
    settle(&[&a, &b]);

    let gossiped = b.pool().get_transaction(&hash).unwrap();
    assert!(gossiped.get_first_seen() > 0);

    // b mines what a queued, and a follows b's new block
    b.mine("miner-b").unwrap();
    settle(&[&a, &b]);

    assert_eq!(a.height().unwrap(), 1);
    assert_eq!(a.balance("bob").unwrap(), 10007.0);
    assert_eq!(a.balances().unwrap(), b.balances().unwrap());
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn tcp_node(addr: &str) -> Result<Arc<Node>> {
    let mut transport = Transport::new(addr);
    transport.set_dialer(Box::new(|peer: &str| -> Result<Arc<dyn Peer>> {
        Ok(Arc::new(TcpPeer::new(peer)?))
    }));
    hashchain_node::network::listen(addr, transport.inbox_sender())?;
    Ok(Arc::new(Node::new(&config(addr, 10), transport)?))
}

fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

#[test]
fn test_sync_over_tcp() {
    let a_addr = format!("127.0.0.1:{}", free_port());
    let b_addr = format!("127.0.0.1:{}", free_port());
    let a = tcp_node(&a_addr).unwrap();
    let b = tcp_node(&b_addr).unwrap();
    let a_loop = a.listen();
    let b_loop = b.listen();

    for _ in 0..3 {
        a.mine("miner").unwrap();
    }
    b.sync_with(&a_addr).unwrap();

    assert!(wait_for(Duration::from_secs(10), || {
        b.height().map(|h| h == 3).unwrap_or(false)
    }));
    assert_eq!(b.tip_hash().unwrap(), a.tip_hash().unwrap());
    assert_eq!(b.balance("miner").unwrap(), 300.0);

    a.kill();
    b.kill();
    a_loop.join().unwrap();
    b_loop.join().unwrap();
}
