use clap::Parser;

use crate::common::{CliError, LogArgs};

/// Main command enumeration for the gasless CLI tool
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version = "0.1")]
pub enum MainCmd {
    /// Resolve the smart account of a key
    Account(crate::account::Cmd),
    /// Read the counter
    Count(crate::count::Cmd),
    /// Increment the counter with a sponsored user operation
    Increment(crate::increment::Cmd),
    /// Interactive session: connect, count, increment
    Console(crate::console::Cmd),
}

/// Error types for the main command system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command error
    #[error("{0}")]
    Cli(#[from] CliError),
}

impl MainCmd {
    fn log_args(&self) -> &LogArgs {
        match self {
            Self::Account(cmd) => &cmd.log_args,
            Self::Count(cmd) => &cmd.log_args,
            Self::Increment(cmd) => &cmd.log_args,
            Self::Console(cmd) => &cmd.log_args,
        }
    }

    /// Execute the main command
    pub async fn run(&self) -> Result<(), Error> {
        self.log_args().init()?;
        match self {
            Self::Account(cmd) => cmd.run().await?,
            Self::Count(cmd) => cmd.run().await?,
            Self::Increment(cmd) => cmd.run().await?,
            Self::Console(cmd) => cmd.run().await?,
        }
        Ok(())
    }
}
