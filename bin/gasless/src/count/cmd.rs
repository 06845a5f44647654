use clap::Parser;
use gasless_counter::read_counter;

use crate::common::{LogArgs, NetworkArgs, Result};

/// Read the counter
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Network configuration
    #[command(flatten)]
    pub network_args: NetworkArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,
}

impl Cmd {
    /// Execute the count command
    pub async fn run(&self) -> Result<()> {
        let chain = self.network_args.chain_config()?;
        let client = self.network_args.chain_client(&chain);
        let count = read_counter(&client, self.network_args.counter).await?;
        println!("{count}");
        Ok(())
    }
}
