//! Owner key loading for the gasless commands.

use std::{fs, io::Read};

use alloy_primitives::hex;
use clap::Parser;
use gasless_counter::{LocalKeyConnector, Session, WalletConnector};

use super::{CliError, PromptConnector, Result, StdinLines};

/// Where the owner key comes from. Without either flag the key is asked for on the terminal.
#[derive(Parser, Debug, Clone, Default)]
pub struct KeyArgs {
    /// Hex-encoded owner private key
    #[arg(long = "private-key", env = "GASLESS_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// File holding the hex-encoded owner private key, `-` for stdin
    #[arg(long = "private-key-file", conflicts_with = "private_key")]
    pub private_key_file: Option<String>,
}

impl KeyArgs {
    /// Loads the key from the flag or the file. Returns `None` if neither is provided.
    pub fn load(&self) -> Result<Option<String>> {
        let raw = if let Some(key) = &self.private_key {
            key.clone()
        } else if let Some(file) = &self.private_key_file {
            if file == "-" {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            } else {
                fs::read_to_string(file)?
            }
        } else {
            return Ok(None);
        };
        normalize_key(&raw).map(Some)
    }

    /// The wallet to authenticate with on `chain_id`.
    pub fn connector(&self, chain_id: u64, lines: impl FnOnce() -> StdinLines) -> Result<Wallet> {
        Ok(match self.load()? {
            Some(key) => Wallet::Key(LocalKeyConnector::from_hex(&key, chain_id)?),
            None => Wallet::Prompt(PromptConnector::new(lines(), chain_id)),
        })
    }
}

/// Checks that `raw` is a 32-byte hex string, with or without `0x`.
pub fn normalize_key(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let bytes = hex::decode(trimmed)?;
    if bytes.len() != 32 {
        return Err(CliError::InvalidInput(format!(
            "private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(hex::encode_prefixed(bytes))
}

/// The wallet a command authenticates with.
#[derive(Debug)]
pub enum Wallet {
    /// Key given on the command line, in the environment or in a file
    Key(LocalKeyConnector),
    /// Key typed on the terminal
    Prompt(PromptConnector),
}

impl WalletConnector for Wallet {
    async fn connect(&self) -> gasless_counter::Result<Session> {
        match self {
            Self::Key(wallet) => wallet.connect().await,
            Self::Prompt(wallet) => wallet.connect().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_normalize_key() {
        let expected = format!("0x{KEY}");
        assert_eq!(normalize_key(KEY).unwrap(), expected);
        assert_eq!(normalize_key(&format!("  0x{KEY}\n")).unwrap(), expected);
    }

    #[test]
    fn test_normalize_key_rejects_bad_input() {
        assert!(matches!(normalize_key("0x1234"), Err(CliError::InvalidInput(_))));
        assert!(matches!(normalize_key("0xzz"), Err(CliError::InvalidHex(_))));
    }

    #[test]
    fn test_load_prefers_flag() {
        let args = KeyArgs { private_key: Some(KEY.to_string()), private_key_file: None };
        assert_eq!(args.load().unwrap(), Some(format!("0x{KEY}")));
        assert_eq!(KeyArgs::default().load().unwrap(), None);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("gasless-key-{}", std::process::id()));
        fs::write(&path, format!("0x{KEY}\n")).unwrap();
        let args =
            KeyArgs { private_key: None, private_key_file: Some(path.display().to_string()) };
        assert_eq!(args.load().unwrap(), Some(format!("0x{KEY}")));
        fs::remove_file(path).unwrap();
    }
}
