use std::{str::FromStr, sync::Arc};

use clap::Parser;
use gasless_counter::{
    rpc::{BundlerRpc, ChainRpc, PaymasterRpc},
    CounterApp, WalletConnector,
};
use tokio::task::JoinSet;
use tracing::debug;

use crate::common::{
    spawn_notifier, CliError, InclusionArgs, KeyArgs, LogArgs, NetworkArgs, Result, StdinLines,
};

/// Interactive session: connect, count, increment
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Network configuration
    #[command(flatten)]
    pub network_args: NetworkArgs,

    /// Owner key. Without one, `connect` asks for it.
    #[command(flatten)]
    pub key_args: KeyArgs,

    /// Inclusion wait configuration
    #[command(flatten)]
    pub inclusion_args: InclusionArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,
}

/// A console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Authenticate and resolve the smart account
    Connect,
    /// Read the counter
    Count,
    /// Run a sponsored increment in the background
    Increment,
    /// Print the session state
    Status,
    /// Print the command list
    Help,
    /// Leave, after in-flight increments finish
    Quit,
}

impl FromStr for Action {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connect" | "c" => Ok(Self::Connect),
            "count" | "read" | "r" => Ok(Self::Count),
            "increment" | "inc" | "i" => Ok(Self::Increment),
            "status" | "s" => Ok(Self::Status),
            "help" | "h" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(CliError::InvalidInput(format!("unknown command '{other}'"))),
        }
    }
}

const HELP: &str = "\
commands:
  connect    authenticate and resolve the smart account
  count      read the counter
  increment  increment the counter, sponsored
  status     show account, counter and last transaction
  help       show this list
  quit       leave";

impl Cmd {
    /// Execute the console command
    pub async fn run(&self) -> Result<()> {
        let chain = self.network_args.chain_config()?;
        let account_config = self.network_args.account_config()?;
        let services = self.network_args.services(&chain, &account_config);
        let lines = StdinLines::spawn();
        let wallet = self.key_args.connector(chain.chain_id, || lines.clone())?;

        let (app, progress) =
            CounterApp::new(chain.clone(), account_config, self.network_args.counter, services);
        let app = Arc::new(app.with_inclusion_policy(self.inclusion_args.policy()));
        let notifier = spawn_notifier(progress, chain);

        println!("{HELP}");
        let mut writes = JoinSet::new();
        while let Some(line) = lines.next_line("> ").await {
            if line.trim().is_empty() {
                continue;
            }
            let action = match line.parse::<Action>() {
                Ok(action) => action,
                Err(err) => {
                    eprintln!("{err}");
                    continue;
                }
            };
            debug!(?action, "Console action");
            match action {
                Action::Connect => connect(&app, &wallet).await,
                Action::Count => match app.refresh_count().await {
                    Ok(count) => println!("count: {count}"),
                    Err(err) => eprintln!("{err}"),
                },
                Action::Increment => {
                    let app = Arc::clone(&app);
                    writes.spawn(async move {
                        match app.increment().await {
                            Ok(_) => match app.count().await {
                                Some(count) => println!("count: {count}"),
                                None => println!("count: unknown"),
                            },
                            Err(err) => eprintln!("{err}"),
                        }
                    });
                }
                Action::Status => status(&app).await,
                Action::Help => println!("{HELP}"),
                Action::Quit => break,
            }
        }

        while writes.join_next().await.is_some() {}
        drop(app);
        let _ = notifier.await;
        Ok(())
    }
}

async fn connect<C, B, P, W>(app: &CounterApp<C, B, P>, wallet: &W)
where
    C: ChainRpc,
    B: BundlerRpc,
    P: PaymasterRpc,
    W: WalletConnector,
{
    match app.connect(wallet).await {
        Ok(account) => {
            println!("owner:   {}", account.owner());
            println!("account: {}", account.address());
        }
        Err(err) if err.is_retryable() => eprintln!("{err}, try again"),
        Err(err) => eprintln!("{err}"),
    }
}

async fn status<C, B, P>(app: &CounterApp<C, B, P>)
where
    C: ChainRpc,
    B: BundlerRpc,
    P: PaymasterRpc,
{
    match app.account() {
        Some(account) => println!("account: {}", account.address()),
        None => println!("account: not connected"),
    }
    match app.count().await {
        Some(count) => println!("count:   {count}"),
        None => println!("count:   not read"),
    }
    println!("busy:    {}", app.is_busy());
    if let Some(outcome) = app.last_outcome().await {
        println!("last tx: {}", outcome.explorer_url(app.chain()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("connect", Action::Connect)]
    #[case(" Count ", Action::Count)]
    #[case("inc", Action::Increment)]
    #[case("i", Action::Increment)]
    #[case("status", Action::Status)]
    #[case("?", Action::Help)]
    #[case("exit", Action::Quit)]
    fn test_parse_action(#[case] input: &str, #[case] expected: Action) {
        assert_eq!(input.parse::<Action>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_action() {
        assert!(matches!("deploy".parse::<Action>(), Err(CliError::InvalidInput(_))));
    }
}
