//! Peer-to-peer networking
//!
//! `Transport` moves opaque `Message`s between nodes, either in-process through
//! `LocalPeer` or over TCP through `TcpPeer`. `BlockChainTransport` speaks the sync
//! protocol on top of it, and `Node` ties the protocol to the chain, pool and miner.

pub mod message;
pub mod payload;
pub mod protocol;
pub mod server;
pub mod tcp;
pub mod transport;

pub use message::Message;
pub use payload::{BCPayload, MessageType};
pub use protocol::BlockChainTransport;
pub use server::Node;
pub use tcp::{listen, TcpPeer};
pub use transport::{Dialer, LocalPeer, Peer, Transport};
