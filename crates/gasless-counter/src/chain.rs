//! Chain configuration: supported networks, endpoint templates and explorer links.

use alloy_primitives::TxHash;
use url::Url;

use crate::{AccountResolutionError, GaslessError, Result};

/// Static description of a network the relay knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedChain {
    /// The EIP-155 chain id.
    pub chain_id: u64,
    /// Human readable name.
    pub name: &'static str,
    /// Default public JSON-RPC endpoint.
    pub rpc_url: &'static str,
    /// Block explorer base URL, without a trailing slash.
    pub explorer_url: &'static str,
}

/// Networks with a bundler and paymaster deployment.
pub const SUPPORTED_CHAINS: &[SupportedChain] = &[
    SupportedChain {
        chain_id: 80001,
        name: "Polygon Mumbai",
        rpc_url: "https://rpc.ankr.com/polygon_mumbai",
        explorer_url: "https://mumbai.polygonscan.com",
    },
    SupportedChain {
        chain_id: 80002,
        name: "Polygon Amoy",
        rpc_url: "https://rpc-amoy.polygon.technology",
        explorer_url: "https://amoy.polygonscan.com",
    },
    SupportedChain {
        chain_id: 84532,
        name: "Base Sepolia",
        rpc_url: "https://sepolia.base.org",
        explorer_url: "https://sepolia.basescan.org",
    },
    SupportedChain {
        chain_id: 11155111,
        name: "Sepolia",
        rpc_url: "https://rpc.sepolia.org",
        explorer_url: "https://sepolia.etherscan.io",
    },
];

/// Returns the supported chain entry for a given chain id.
pub fn supported_chain(chain_id: u64) -> Option<&'static SupportedChain> {
    SUPPORTED_CHAINS.iter().find(|chain| chain.chain_id == chain_id)
}

/// Builds the hosted bundler URL for a chain and API key.
pub fn bundler_url(chain_id: u64, api_key: &str) -> Result<Url> {
    parse_endpoint(&format!("https://bundler.biconomy.io/api/v2/{chain_id}/{api_key}"))
}

/// Builds the hosted paymaster URL for a chain and API key.
pub fn paymaster_url(chain_id: u64, api_key: &str) -> Result<Url> {
    parse_endpoint(&format!("https://paymaster.biconomy.io/api/v1/{chain_id}/{api_key}"))
}

/// Parses an http(s) endpoint.
pub fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| {
        GaslessError::AccountResolution(AccountResolutionError::InvalidEndpoint(format!(
            "{raw}: {e}"
        )))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(GaslessError::AccountResolution(AccountResolutionError::InvalidEndpoint(
            format!("{raw}: unsupported scheme '{scheme}'"),
        ))),
    }
}

/// Runtime chain configuration shared by the read and write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// The EIP-155 chain id.
    pub chain_id: u64,
    /// JSON-RPC endpoint used for reads.
    pub rpc_url: Url,
    /// Block explorer base URL.
    pub explorer_url: Url,
}

impl ChainConfig {
    /// Creates the configuration of a supported chain with its default endpoints.
    pub fn supported(chain_id: u64) -> Result<Self> {
        let chain = supported_chain(chain_id).ok_or(GaslessError::AccountResolution(
            AccountResolutionError::UnsupportedChain(chain_id),
        ))?;
        Ok(Self {
            chain_id,
            rpc_url: parse_endpoint(chain.rpc_url)?,
            explorer_url: parse_endpoint(chain.explorer_url)?,
        })
    }

    /// Overrides the JSON-RPC endpoint.
    pub fn with_rpc_url(mut self, rpc_url: Url) -> Self {
        self.rpc_url = rpc_url;
        self
    }

    /// Overrides the explorer base URL.
    pub fn with_explorer_url(mut self, explorer_url: Url) -> Self {
        self.explorer_url = explorer_url;
        self
    }

    /// Whether the chain id is in [`SUPPORTED_CHAINS`].
    pub fn is_supported(&self) -> bool {
        supported_chain(self.chain_id).is_some()
    }

    /// Link to the explorer page of a transaction.
    pub fn explorer_tx_url(&self, tx_hash: TxHash) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.as_str().trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_mumbai_defaults() {
        let chain = ChainConfig::supported(80001).unwrap();
        assert_eq!(chain.rpc_url.as_str(), "https://rpc.ankr.com/polygon_mumbai");
        assert!(chain.is_supported());
    }

    #[test]
    fn test_unsupported_chain_is_rejected() {
        let err = ChainConfig::supported(1).unwrap_err();
        assert!(matches!(
            err,
            GaslessError::AccountResolution(AccountResolutionError::UnsupportedChain(1))
        ));
    }

    #[test]
    fn test_explorer_link() {
        let chain = ChainConfig::supported(80001).unwrap();
        let hash = b256!("1111111111111111111111111111111111111111111111111111111111111111");
        assert_eq!(
            chain.explorer_tx_url(hash),
            format!("https://mumbai.polygonscan.com/tx/{hash}")
        );
    }

    #[test]
    fn test_endpoint_scheme() {
        assert!(parse_endpoint("ws://localhost:8545").is_err());
        assert!(parse_endpoint("not a url").is_err());
        let url = bundler_url(80001, "key").unwrap();
        assert_eq!(url.as_str(), "https://bundler.biconomy.io/api/v2/80001/key");
    }
}
