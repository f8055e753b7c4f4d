use crate::error::{BlockchainError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_PEERS_KEY: &str = "NODE_PEERS";
const POW_DIFFICULTY_KEY: &str = "POW_DIFFICULTY";
const BLOCK_TX_LIMIT_KEY: &str = "BLOCK_TX_LIMIT";
const INITIAL_BALANCE_KEY: &str = "INITIAL_BALANCE";

/// Node settings. Built-in defaults, then an optional TOML file, then the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    node_addr: String,
    peers: Vec<String>,
    required_prefix_zeros: u8,
    block_tx_limit: usize,
    initial_balance: f64,
    initial_reward: f64,
    blocks_to_halve_reward: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_addr: String::from(DEFAULT_NODE_ADDR),
            peers: vec![],
            required_prefix_zeros: 1,
            block_tx_limit: 10,
            initial_balance: 10000.0,
            initial_reward: 100.0,
            blocks_to_halve_reward: 10,
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied
    pub fn new() -> Result<Config> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Settings from a TOML file with environment overrides applied on top
    pub fn from_file(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let mut config: Config = toml::from_str(&text)?;
        config.apply_env()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => Config::from_file(path),
            None => Config::new(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides looked up by environment key. Unparsable values are errors.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.node_addr = addr;
        }
        if let Some(peers) = lookup(NODE_PEERS_KEY) {
            self.peers = peers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = lookup(POW_DIFFICULTY_KEY) {
            self.required_prefix_zeros = parse_value(POW_DIFFICULTY_KEY, &value)?;
        }
        if let Some(value) = lookup(BLOCK_TX_LIMIT_KEY) {
            self.block_tx_limit = parse_value(BLOCK_TX_LIMIT_KEY, &value)?;
        }
        if let Some(value) = lookup(INITIAL_BALANCE_KEY) {
            self.initial_balance = parse_value(INITIAL_BALANCE_KEY, &value)?;
        }
        Ok(())
    }

    pub fn get_node_addr(&self) -> &str {
        &self.node_addr
    }

    pub fn set_node_addr(&mut self, addr: String) {
        self.node_addr = addr;
    }

    pub fn get_peers(&self) -> &[String] {
        &self.peers
    }

    pub fn add_peer(&mut self, addr: String) {
        if !self.peers.contains(&addr) {
            self.peers.push(addr);
        }
    }

    pub fn get_required_prefix_zeros(&self) -> u8 {
        self.required_prefix_zeros
    }

    pub fn set_required_prefix_zeros(&mut self, zeros: u8) {
        self.required_prefix_zeros = zeros;
    }

    pub fn get_block_tx_limit(&self) -> usize {
        self.block_tx_limit
    }

    pub fn set_block_tx_limit(&mut self, limit: usize) {
        self.block_tx_limit = limit;
    }

    pub fn get_initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn get_initial_reward(&self) -> f64 {
        self.initial_reward
    }

    pub fn get_blocks_to_halve_reward(&self) -> u32 {
        self.blocks_to_halve_reward
    }

    /// Port part of the node address, used to tell nodes apart in logs
    pub fn extract_node_id_from_addr(&self) -> String {
        match self.node_addr.rsplit_once(':') {
            Some((_, port)) => port.to_string(),
            None => "default".to_string(),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BlockchainError::Config(format!("Invalid value for {key}: {value}")))
}
