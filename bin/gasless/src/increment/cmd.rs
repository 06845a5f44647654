use clap::Parser;
use gasless_counter::CounterApp;

use crate::common::{
    spawn_notifier, InclusionArgs, KeyArgs, LogArgs, NetworkArgs, Result, StdinLines,
};

/// Increment the counter with a sponsored user operation
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Network configuration
    #[command(flatten)]
    pub network_args: NetworkArgs,

    /// Owner key
    #[command(flatten)]
    pub key_args: KeyArgs,

    /// Inclusion wait configuration
    #[command(flatten)]
    pub inclusion_args: InclusionArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,
}

impl Cmd {
    /// Execute the increment command
    pub async fn run(&self) -> Result<()> {
        let chain = self.network_args.chain_config()?;
        let account_config = self.network_args.account_config()?;
        let services = self.network_args.services(&chain, &account_config);
        let wallet = self.key_args.connector(chain.chain_id, StdinLines::spawn)?;

        let (app, progress) =
            CounterApp::new(chain.clone(), account_config, self.network_args.counter, services);
        let app = app.with_inclusion_policy(self.inclusion_args.policy());
        let notifier = spawn_notifier(progress, chain);

        let account = app.connect(&wallet).await?;
        println!("account: {}", account.address());
        println!("count:   {}", app.refresh_count().await?);

        let result = app.increment().await;
        let count = app.count().await;
        // Closing the stream lets the notifier drain the remaining updates.
        drop(app);
        let _ = notifier.await;

        let outcome = result?;
        println!("user op: {}", outcome.user_op_hash);
        println!("tx:      {}", outcome.tx_hash);
        if let Some(count) = count {
            println!("count:   {count}");
        }
        Ok(())
    }
}
