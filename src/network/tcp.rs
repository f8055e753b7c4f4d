use crate::error::{BlockchainError, Result};
use crate::network::{Message, Peer};
use crate::utils::{deserialize_prefix, MAX_MESSAGE_BYTES};
use log::{debug, error, info, warn};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

const TCP_WRITE_TIMEOUT: u64 = 5000;
const TCP_READ_TIMEOUT: u64 = 60000;

/// Peer reached over TCP. Every message goes out on its own short-lived connection.
pub struct TcpPeer {
    address: String,
    socket_addr: SocketAddr,
}

impl TcpPeer {
    pub fn new(address: &str) -> Result<TcpPeer> {
        let socket_addr = address
            .parse::<SocketAddr>()
            .map_err(|e| BlockchainError::Network(format!("Invalid address {address}: {e}")))?;
        Ok(TcpPeer {
            address: address.to_string(),
            socket_addr,
        })
    }
}

impl Peer for TcpPeer {
    fn address(&self) -> &str {
        &self.address
    }

    fn send_message(&self, message: &Message) -> Result<()> {
        let bytes = message.serialize()?;
        debug!("Sending {} bytes to {}", bytes.len(), self.address);

        let mut stream = TcpStream::connect_timeout(
            &self.socket_addr,
            Duration::from_millis(TCP_WRITE_TIMEOUT),
        )
        .map_err(|e| BlockchainError::Network(format!("Failed to connect to {}: {e}", self.address)))?;

        stream
            .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

        stream
            .write_all(&bytes)
            .map_err(|e| BlockchainError::Network(format!("Failed to send data: {e}")))?;
        let _ = stream.flush();
        let _ = stream.shutdown(Shutdown::Write);
        Ok(())
    }
}

/// Binds `addr` and feeds every decoded message into `inbox` from a background
/// accept loop. Returns the bound address, which matters when binding port 0.
pub fn listen(addr: &str, inbox: Sender<Message>) -> Result<SocketAddr> {
    let listener = TcpListener::bind(addr)
        .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| BlockchainError::Network(format!("Failed to read bound address: {e}")))?;
    info!("Listening on {local_addr}");

    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let inbox = inbox.clone();
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, inbox) {
                            error!("Error handling connection: {e}");
                        }
                    });
                }
                Err(e) => error!("Error accepting connection: {e}"),
            }
        }
    });

    Ok(local_addr)
}

fn handle_connection(mut stream: TcpStream, inbox: Sender<Message>) -> Result<()> {
    let peer_addr = stream
        .peer_addr()
        .map_err(|e| BlockchainError::Network(format!("Failed to get peer address: {e}")))?;
    stream
        .set_read_timeout(Some(Duration::from_millis(TCP_READ_TIMEOUT)))
        .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

    // One byte past the cap tells an oversized connection apart from one that fits exactly
    let mut buf = vec![];
    (&mut stream)
        .take(MAX_MESSAGE_BYTES as u64 + 1)
        .read_to_end(&mut buf)?;
    if buf.len() > MAX_MESSAGE_BYTES {
        warn!("Dropping connection from {peer_addr}: more than {MAX_MESSAGE_BYTES} bytes");
        let _ = stream.shutdown(Shutdown::Both);
        return Ok(());
    }

    let mut offset = 0;
    while offset < buf.len() {
        match deserialize_prefix::<Message>(&buf[offset..]) {
            Ok((message, consumed)) => {
                offset += consumed;
                if inbox.send(message).is_err() {
                    warn!("Inbox closed, dropping the rest of {peer_addr}");
                    break;
                }
            }
            Err(e) => {
                warn!("Dropping undecodable data from {peer_addr}: {e}");
                break;
            }
        }
    }

    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}
