use alloy_primitives::hex::FromHexError;
use gasless_counter::GaslessError;

/// Error types of the gasless commands
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error raised by the counter flow
    #[error("{0}")]
    Gasless(#[from] GaslessError),

    /// Failed to read a file or the terminal
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid hex string
    #[error("Invalid hex string: {0}")]
    InvalidHex(#[from] FromHexError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for the gasless commands
pub type Result<T, E = CliError> = std::result::Result<T, E>;
