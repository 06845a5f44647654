use clap::Parser;
use gasless_counter::{resolve, WalletConnector};
use tracing::info;

use crate::common::{KeyArgs, LogArgs, NetworkArgs, Result, StdinLines};

/// Resolve the smart account of a key
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Network configuration
    #[command(flatten)]
    pub network_args: NetworkArgs,

    /// Owner key
    #[command(flatten)]
    pub key_args: KeyArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,
}

impl Cmd {
    /// Execute the account command
    pub async fn run(&self) -> Result<()> {
        let chain = self.network_args.chain_config()?;
        let account_config = self.network_args.account_config()?;
        let services = self.network_args.services(&chain, &account_config);

        let wallet = self.key_args.connector(chain.chain_id, StdinLines::spawn)?;
        let session = wallet.connect().await?;
        let account = resolve(&chain, &session, &account_config, &services).await?;
        let deployed = account.is_deployed(&services.chain).await?;
        info!(account = %account.address(), deployed, "Account resolved");

        println!("owner:       {}", account.owner());
        println!("account:     {}", account.address());
        println!("deployed:    {deployed}");
        println!("chain:       {}", account.chain_id());
        println!("entry point: {}", account.entry_point());
        println!("bundler:     {}", account.bundler_url());
        println!("paymaster:   {}", account.paymaster_url());
        Ok(())
    }
}
