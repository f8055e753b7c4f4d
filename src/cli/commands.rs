use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Options for the node binary. Anything given here wins over the config file and
/// the environment.
#[derive(Debug, Parser)]
#[command(name = "hashchain-node", about = "Proof-of-work node with hash-chain sync")]
pub struct Opt {
    #[arg(long = "config", help = "TOML file with node settings")]
    pub config: Option<PathBuf>,
    #[arg(long = "addr", help = "Address to listen on, e.g. 127.0.0.1:2001")]
    pub addr: Option<String>,
    #[arg(long = "peer", help = "Peer to connect to (repeatable)")]
    pub peers: Vec<String>,
    #[arg(long = "difficulty", help = "Required leading zero hex digits in block hashes")]
    pub difficulty: Option<u8>,
    #[arg(long = "script", help = "Shell script to run before the interactive prompt")]
    pub script: Option<PathBuf>,
}

/// One line of shell input
#[derive(Debug, Parser)]
#[command(no_binary_name = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    #[command(name = "add_wallet", about = "Register a wallet with the initial balance")]
    AddWallet {
        #[arg(help = "Wallet id")]
        id: String,
    },
    #[command(name = "wallets", about = "List known wallets")]
    Wallets,
    #[command(name = "transact", about = "Queue a transfer between two wallets")]
    Transact {
        #[arg(help = "Sending wallet")]
        from: String,
        #[arg(help = "Receiving wallet")]
        to: String,
        #[arg(help = "Amount to transfer", allow_negative_numbers = true)]
        amount: f64,
    },
    #[command(name = "mine", about = "Mine a block paying the reward to WALLET")]
    Mine {
        #[arg(help = "Wallet that receives the reward")]
        wallet: String,
    },
    #[command(name = "balance", about = "Show a wallet's balance")]
    Balance {
        #[arg(help = "Wallet id")]
        id: String,
    },
    #[command(name = "run", about = "Run the commands in a script file")]
    Run {
        #[arg(help = "Path to the script")]
        script_path: PathBuf,
    },
    #[command(name = "sync", about = "Send our hash chain to a peer")]
    Sync {
        #[arg(help = "Peer address")]
        peer: String,
    },
    #[command(name = "height", about = "Show the chain height")]
    Height,
}
