use crate::error::{BlockchainError, Result};
use crate::network::Message;
use log::{debug, error, warn};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Somewhere a message can be delivered to.
pub trait Peer: Send + Sync {
    fn address(&self) -> &str;

    fn send_message(&self, message: &Message) -> Result<()>;
}

/// Opens a peer for an address the transport has not connected yet.
pub type Dialer = Box<dyn Fn(&str) -> Result<Arc<dyn Peer>> + Send + Sync>;

/// In-process peer that drops messages straight into another transport's inbox
#[derive(Clone)]
pub struct LocalPeer {
    address: String,
    sender: Sender<Message>,
}

impl LocalPeer {
    pub fn new(address: &str, sender: Sender<Message>) -> LocalPeer {
        LocalPeer {
            address: address.to_string(),
            sender,
        }
    }
}

impl Peer for LocalPeer {
    fn address(&self) -> &str {
        &self.address
    }

    fn send_message(&self, message: &Message) -> Result<()> {
        self.sender.send(message.clone()).map_err(|_| {
            BlockchainError::Network(format!("Inbox of {} is closed", self.address))
        })
    }
}

/// One node's view of the network: an inbox everyone can write to and the peers
/// it can write to in turn.
pub struct Transport {
    address: String,
    inbox: Mutex<Receiver<Message>>,
    inbox_sender: Sender<Message>,
    peers: RwLock<HashMap<String, Arc<dyn Peer>>>,
    dialer: Option<Dialer>,
}

impl Transport {
    pub fn new(address: &str) -> Transport {
        let (inbox_sender, inbox) = mpsc::channel();
        Transport {
            address: address.to_string(),
            inbox: Mutex::new(inbox),
            inbox_sender,
            peers: RwLock::new(HashMap::new()),
            dialer: None,
        }
    }

    /// Lets replies reach senders we never connected to explicitly
    pub fn set_dialer(&mut self, dialer: Dialer) {
        self.dialer = Some(dialer);
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connect(&self, peer: Arc<dyn Peer>) {
        let address = peer.address().to_string();
        if address == self.address {
            debug!("Ignoring connection to ourselves at {address}");
            return;
        }
        match self.peers.write() {
            Ok(mut peers) => {
                peers.insert(address, peer);
            }
            Err(e) => error!("Peers lock poisoned: {e}"),
        }
    }

    pub fn disconnect(&self, address: &str) {
        match self.peers.write() {
            Ok(mut peers) => {
                peers.remove(address);
            }
            Err(e) => error!("Peers lock poisoned: {e}"),
        }
    }

    pub fn peers(&self) -> Vec<String> {
        match self.peers.read() {
            Ok(peers) => {
                let mut addresses: Vec<String> = peers.keys().cloned().collect();
                addresses.sort();
                addresses
            }
            Err(e) => {
                error!("Peers lock poisoned: {e}");
                vec![]
            }
        }
    }

    fn get_peer(&self, address: &str) -> Result<Option<Arc<dyn Peer>>> {
        let peers = self
            .peers
            .read()
            .map_err(|e| BlockchainError::Lock(format!("Peers lock poisoned: {e}")))?;
        Ok(peers.get(address).cloned())
    }

    /// Sends to a connected peer. An address we are not connected to is dialed for
    /// this one message only; it never joins the peer set, since the address usually
    /// comes from an inbound message's `from`.
    pub fn send_message_to(&self, address: &str, message: &Message) -> Result<()> {
        let peer = match self.get_peer(address)? {
            Some(peer) => peer,
            None => match &self.dialer {
                Some(dial) => {
                    debug!("Dialing {address} for a one-off message");
                    dial(address)?
                }
                None => return Err(BlockchainError::PeerNotConnected(address.to_string())),
            },
        };
        peer.send_message(message)
    }

    /// Sends to every connected peer. A peer that can't be reached is logged and
    /// skipped; returns how many deliveries went through.
    pub fn broadcast(&self, message: &Message) -> usize {
        let peers: Vec<Arc<dyn Peer>> = match self.peers.read() {
            Ok(peers) => peers.values().cloned().collect(),
            Err(e) => {
                error!("Peers lock poisoned: {e}");
                return 0;
            }
        };

        let mut delivered = 0;
        for peer in peers {
            match peer.send_message(message) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Failed to reach peer {}: {e}", peer.address()),
            }
        }
        delivered
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Message> {
        let inbox = match self.inbox.lock() {
            Ok(inbox) => inbox,
            Err(e) => {
                error!("Inbox lock poisoned: {e}");
                return None;
            }
        };
        match inbox.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<Message> {
        match self.inbox.lock() {
            Ok(inbox) => inbox.try_recv().ok(),
            Err(e) => {
                error!("Inbox lock poisoned: {e}");
                None
            }
        }
    }

    pub fn inbox_sender(&self) -> Sender<Message> {
        self.inbox_sender.clone()
    }

    /// A peer other in-process transports can connect to in order to reach this one
    pub fn local_peer(&self) -> LocalPeer {
        LocalPeer::new(&self.address, self.inbox_sender())
    }
}
