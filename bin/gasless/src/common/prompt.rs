//! Terminal input shared by the interactive wallet and the console.

use std::{
    io::{BufRead, Write},
    sync::Arc,
};

use gasless_counter::{
    AuthenticationError, LocalKeyConnector, Result, Session, WalletConnector,
};
use tokio::sync::{mpsc, Mutex};

/// Lines of stdin, read by a dedicated thread.
#[derive(Debug, Clone)]
pub struct StdinLines {
    lines: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl StdinLines {
    /// Starts reading stdin. Call once per process.
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        });
        Self::from_receiver(receiver)
    }

    /// Lines coming from `receiver` instead of stdin.
    pub fn from_receiver(receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self { lines: Arc::new(Mutex::new(receiver)) }
    }

    /// Prints `prompt` and waits for the next line. `None` at end of input.
    pub async fn next_line(&self, prompt: &str) -> Option<String> {
        let mut stderr = std::io::stderr();
        // A failed prompt write leaves the input readable.
        let _ = write!(stderr, "{prompt}").and_then(|()| stderr.flush());
        self.lines.lock().await.recv().await
    }
}

/// Interactive wallet: asks for the owner key on the terminal.
///
/// Empty input or end of input cancels the authentication.
#[derive(Debug, Clone)]
pub struct PromptConnector {
    lines: StdinLines,
    chain_id: u64,
}

impl PromptConnector {
    /// Creates a prompt for a key on `chain_id`.
    pub fn new(lines: StdinLines, chain_id: u64) -> Self {
        Self { lines, chain_id }
    }
}

impl WalletConnector for PromptConnector {
    async fn connect(&self) -> Result<Session> {
        let key = self
            .lines
            .next_line("Owner private key (empty to cancel): ")
            .await
            .ok_or(AuthenticationError::Cancelled)?;
        LocalKeyConnector::from_hex(key.trim(), self.chain_id)?.connect().await
    }
}
