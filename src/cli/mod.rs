//! Command-line interface
//!
//! Options for the node binary and the line-oriented shell used both interactively
//! and for script replay.

pub mod commands;
pub mod shell;

pub use commands::{Command, Opt, ShellLine};
pub use shell::Shell;
