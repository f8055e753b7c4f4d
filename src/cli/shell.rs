// The shell is how I drive a running node by hand
// Every line goes through the same clap parser, so scripts and the prompt accept
// exactly the same commands

use crate::cli::{Command, ShellLine};
use crate::error::{BlockchainError, Result};
use crate::network::Node;
use clap::Parser;
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

const PROMPT: &str = ">>> ";

pub struct Shell {
    node: Arc<Node>,
}

impl Shell {
    pub fn new(node: Arc<Node>) -> Shell {
        Shell { node }
    }

    /// Runs one line and returns what should be printed for it
    pub fn execute(&self, line: &str) -> Result<String> {
        let words = line.split_whitespace();
        let parsed = ShellLine::try_parse_from(words)
            .map_err(|e| BlockchainError::InvalidCommand(e.to_string().trim().to_string()))?;
        self.run_command(parsed.command)
    }

    fn run_command(&self, command: Command) -> Result<String> {
        match command {
            Command::AddWallet { id } => {
                self.node.add_wallet(&id)?;
                Ok(format!("Added wallet {id}"))
            }
            Command::Wallets => {
                let wallets = self.node.wallets()?;
                if wallets.is_empty() {
                    return Ok("No wallets".to_string());
                }
                Ok(wallets.join("\n"))
            }
            Command::Transact { from, to, amount } => {
                let hash = self.node.transact(&from, &to, amount)?;
                Ok(format!("Queued transaction {hash}"))
            }
            Command::Mine { wallet } => {
                let hash = self.node.mine(&wallet)?;
                Ok(format!(
                    "Mined block {hash} at height {}",
                    self.node.height()?
                ))
            }
            Command::Balance { id } => {
                let balance = self.node.balance(&id)?;
                Ok(format!("{id}: {balance}"))
            }
            Command::Run { script_path } => self.run_script(&script_path),
            Command::Sync { peer } => {
                self.node.sync_with(&peer)?;
                Ok(format!("Sent hash chain to {peer}"))
            }
            Command::Height => Ok(self.node.height()?.to_string()),
        }
    }

    /// Replays a script line by line. Blank lines and `#` comments are skipped; the
    /// first failing line stops the run.
    pub fn run_script(&self, path: &Path) -> Result<String> {
        let text = fs::read_to_string(path)?;
        let mut output = vec![];
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            output.push(self.execute(line)?);
        }
        Ok(output.join("\n"))
    }

    /// Prompt loop. Errors are printed and the loop keeps going until EOF or `exit`.
    pub fn run_interactive<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> Result<()> {
        loop {
            write!(writer, "{PROMPT}")?;
            writer.flush()?;

            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            match self.execute(line) {
                Ok(output) if output.is_empty() => {}
                Ok(output) => writeln!(writer, "{output}")?,
                Err(e) => writeln!(writer, "Error: {e}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Transport;
    use crate::testnet::test_utils::test_config;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    fn shell() -> Shell {
        let node = Node::new(&test_config("shell"), Transport::new("shell")).unwrap();
        Shell::new(Arc::new(node))
    }

    #[test]
    fn test_parse_commands() {
        let parsed = ShellLine::try_parse_from("transact alice bob 2.5".split_whitespace()).unwrap();
        assert_eq!(
            parsed.command,
            Command::Transact {
                from: "alice".to_string(),
                to: "bob".to_string(),
                amount: 2.5
            }
        );
        assert!(ShellLine::try_parse_from("transact alice".split_whitespace()).is_err());
    }

    #[test]
    fn test_execute_wallet_commands() {
        let shell = shell();
        assert_eq!(shell.execute("wallets").unwrap(), "No wallets");
        assert_eq!(shell.execute("add_wallet alice").unwrap(), "Added wallet alice");
        assert_eq!(shell.execute("balance alice").unwrap(), "alice: 10000");
        assert!(matches!(
            shell.execute("add_wallet alice"),
            Err(BlockchainError::WalletAlreadyExists(_))
        ));
    }

    #[test]
    fn test_unknown_command_is_invalid() {
        let shell = shell();
        assert!(matches!(
            shell.execute("launch rockets"),
            Err(BlockchainError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_script_skips_comments_and_stops_on_error() {
        let shell = shell();
        let mut script = NamedTempFile::new().unwrap();
        writeln!(script, "# setup").unwrap();
        writeln!(script, "add_wallet alice").unwrap();
        writeln!(script).unwrap();
        writeln!(script, "add_wallet bob").unwrap();
        writeln!(script, "transact alice carol 5").unwrap();
        writeln!(script, "add_wallet dave").unwrap();

        let line = format!("run {}", script.path().display());
        let result = shell.execute(&line);

        assert!(matches!(result, Err(BlockchainError::NoSuchWallet(_))));
        assert_eq!(shell.node.wallets().unwrap(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_script_mines_blocks() {
        let shell = shell();
        let mut script = NamedTempFile::new().unwrap();
        writeln!(script, "add_wallet alice").unwrap();
        writeln!(script, "add_wallet bob").unwrap();
        writeln!(script, "transact alice bob 10").unwrap();
        writeln!(script, "mine alice").unwrap();

        let output = shell.run_script(script.path()).unwrap();

        assert!(output.contains("Mined block"));
        assert_eq!(shell.execute("height").unwrap(), "1");
        assert_eq!(shell.execute("balance bob").unwrap(), "bob: 10010");
        assert_eq!(shell.execute("balance alice").unwrap(), "alice: 10090");
    }

    #[test]
    fn test_interactive_loop_reports_errors_and_continues() {
        let shell = shell();
        let input = Cursor::new("add_wallet alice\nbalance nobody\nheight\nexit\nheight\n");
        let mut output = vec![];

        shell.run_interactive(input, &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with(">>> Added wallet alice"));
        assert!(text.contains("Error: No such wallet: nobody"));
        assert_eq!(text.matches(">>> ").count(), 4);
    }
}
