//! Network configuration of the gasless commands.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use clap::Parser;
use gasless_counter::{
    chain::{self, parse_endpoint, ChainConfig},
    pipeline::InclusionPolicy,
    rpc::{HttpBundler, HttpChain, HttpPaymaster, HttpServices, Services},
    AccountConfig,
};

use super::{CliError, Result};

/// Chain, relay endpoints and smart account configuration.
///
/// Defaults target Polygon Mumbai with the hosted bundler and paymaster.
#[derive(Parser, Debug, Clone)]
pub struct NetworkArgs {
    /// `ChainID` to use
    #[arg(long = "chain.id", env = "GASLESS_CHAIN_ID", default_value = "80001")]
    pub chain_id: u64,

    /// JSON-RPC endpoint for reads. Defaults to the public endpoint of the chain.
    #[arg(long = "rpc.url", env = "GASLESS_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Block explorer base URL. Defaults to the explorer of the chain.
    #[arg(long = "explorer.url", env = "GASLESS_EXPLORER_URL")]
    pub explorer_url: Option<String>,

    /// Bundler endpoint. Takes precedence over `--bundler.key`.
    #[arg(long = "bundler.url", env = "GASLESS_BUNDLER_URL")]
    pub bundler_url: Option<String>,

    /// API key of the hosted bundler
    #[arg(long = "bundler.key", env = "GASLESS_BUNDLER_API_KEY", hide_env_values = true)]
    pub bundler_key: Option<String>,

    /// Paymaster endpoint. Takes precedence over `--paymaster.key`.
    #[arg(long = "paymaster.url", env = "GASLESS_PAYMASTER_URL")]
    pub paymaster_url: Option<String>,

    /// API key of the hosted paymaster
    #[arg(long = "paymaster.key", env = "GASLESS_PAYMASTER_API_KEY", hide_env_values = true)]
    pub paymaster_key: Option<String>,

    /// ERC-4337 entry point
    #[arg(
        long = "account.entry-point",
        env = "GASLESS_ENTRY_POINT",
        default_value = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789"
    )]
    pub entry_point: Address,

    /// Smart account factory
    #[arg(
        long = "account.factory",
        env = "GASLESS_ACCOUNT_FACTORY",
        default_value = "0x000000a56Aaca3e9a4C479ea6b6CD0DbcB6634F5"
    )]
    pub factory: Address,

    /// ECDSA ownership validation module
    #[arg(
        long = "account.module",
        env = "GASLESS_VALIDATION_MODULE",
        default_value = "0x0000001c5b32F37F5beA87BDD5374eB2aC54eA8e"
    )]
    pub validation_module: Address,

    /// Account index passed to the factory
    #[arg(long = "account.index", env = "GASLESS_ACCOUNT_INDEX", default_value = "0")]
    pub index: U256,

    /// Counter contract
    #[arg(
        long = "counter",
        env = "GASLESS_COUNTER",
        default_value = "0xc34E02663D5FFC7A1CeaC3081bF811431B096C8C"
    )]
    pub counter: Address,
}

impl NetworkArgs {
    /// Creates the [`ChainConfig`], applying endpoint overrides.
    pub fn chain_config(&self) -> Result<ChainConfig> {
        let mut config = ChainConfig::supported(self.chain_id)?;
        if let Some(rpc_url) = &self.rpc_url {
            config = config.with_rpc_url(parse_endpoint(rpc_url)?);
        }
        if let Some(explorer_url) = &self.explorer_url {
            config = config.with_explorer_url(parse_endpoint(explorer_url)?);
        }
        Ok(config)
    }

    /// Creates the [`AccountConfig`].
    pub fn account_config(&self) -> Result<AccountConfig> {
        let bundler_url = match (&self.bundler_url, &self.bundler_key) {
            (Some(url), _) => parse_endpoint(url)?,
            (None, Some(key)) => chain::bundler_url(self.chain_id, key)?,
            (None, None) => {
                return Err(CliError::InvalidInput(
                    "either --bundler.url or --bundler.key is required".to_string(),
                ))
            }
        };
        let paymaster_url = match (&self.paymaster_url, &self.paymaster_key) {
            (Some(url), _) => parse_endpoint(url)?,
            (None, Some(key)) => chain::paymaster_url(self.chain_id, key)?,
            (None, None) => {
                return Err(CliError::InvalidInput(
                    "either --paymaster.url or --paymaster.key is required".to_string(),
                ))
            }
        };
        Ok(AccountConfig::new(bundler_url, paymaster_url)
            .with_entry_point(self.entry_point)
            .with_factory(self.factory)
            .with_validation_module(self.validation_module)
            .with_index(self.index))
    }

    /// Chain client only, for commands that never touch the relay.
    pub fn chain_client(&self, chain: &ChainConfig) -> HttpChain {
        HttpChain::new(chain.rpc_url.clone())
    }

    /// The HTTP collaborators of the given configuration.
    pub fn services(&self, chain: &ChainConfig, account: &AccountConfig) -> HttpServices {
        Services::new(
            self.chain_client(chain),
            HttpBundler::new(account.bundler_url.clone()),
            HttpPaymaster::new(account.paymaster_url.clone()),
        )
    }
}

/// Bounds of the inclusion wait.
#[derive(Parser, Debug, Clone)]
pub struct InclusionArgs {
    /// Seconds between two receipt polls
    #[arg(long = "inclusion.poll-interval", env = "GASLESS_POLL_INTERVAL", default_value = "2")]
    pub poll_interval: u64,

    /// Seconds to wait for inclusion before giving up
    #[arg(long = "inclusion.timeout", env = "GASLESS_INCLUSION_TIMEOUT", default_value = "120")]
    pub timeout: u64,

    /// Confirmations required, the inclusion block counting as one
    #[arg(long = "inclusion.confirmations", env = "GASLESS_CONFIRMATIONS", default_value = "1")]
    pub confirmations: u64,
}

impl InclusionArgs {
    /// Creates the [`InclusionPolicy`].
    pub fn policy(&self) -> InclusionPolicy {
        InclusionPolicy::default()
            .with_poll_interval(Duration::from_secs(self.poll_interval.max(1)))
            .with_timeout(Duration::from_secs(self.timeout))
            .with_confirmations(self.confirmations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasless_counter::constants::{
        account::{ACCOUNT_FACTORY_V2, ECDSA_OWNERSHIP_MODULE},
        counter::MUMBAI_COUNTER,
        entry_point::ENTRY_POINT_V06,
    };

    #[derive(Parser, Debug)]
    struct TestCmd {
        #[command(flatten)]
        network: NetworkArgs,
        #[command(flatten)]
        inclusion: InclusionArgs,
    }

    fn parse(args: &[&str]) -> TestCmd {
        TestCmd::try_parse_from(std::iter::once("gasless").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_match_constants() {
        let cmd = parse(&["--bundler.key", "b", "--paymaster.key", "p"]);
        assert_eq!(cmd.network.entry_point, ENTRY_POINT_V06);
        assert_eq!(cmd.network.factory, ACCOUNT_FACTORY_V2);
        assert_eq!(cmd.network.validation_module, ECDSA_OWNERSHIP_MODULE);
        assert_eq!(cmd.network.counter, MUMBAI_COUNTER);

        let account = cmd.network.account_config().unwrap();
        assert_eq!(account, AccountConfig::for_chain(80001, "b", "p").unwrap());
        assert_eq!(cmd.inclusion.policy(), InclusionPolicy::default());
    }

    #[test]
    fn test_explicit_endpoints_take_precedence() {
        let cmd = parse(&[
            "--bundler.url",
            "http://localhost:3000/rpc",
            "--bundler.key",
            "ignored",
            "--paymaster.url",
            "http://localhost:3001/rpc",
            "--rpc.url",
            "http://localhost:8545",
        ]);
        let account = cmd.network.account_config().unwrap();
        assert_eq!(account.bundler_url.as_str(), "http://localhost:3000/rpc");
        assert_eq!(account.paymaster_url.as_str(), "http://localhost:3001/rpc");
        let chain = cmd.network.chain_config().unwrap();
        assert_eq!(chain.rpc_url.as_str(), "http://localhost:8545/");
    }

    #[test]
    fn test_missing_relay_endpoint() {
        let cmd = parse(&["--bundler.key", "b"]);
        assert!(matches!(cmd.network.account_config(), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_unsupported_chain() {
        let cmd = parse(&["--chain.id", "1"]);
        assert!(matches!(cmd.network.chain_config(), Err(CliError::Gasless(_))));
    }
}
