//! Configuration management
//!
//! Node address, known peers, mining difficulty and ledger/reward settings. Values
//! come from built-in defaults, an optional TOML file, and environment overrides,
//! in that order.

pub mod settings;

pub use settings::Config;
