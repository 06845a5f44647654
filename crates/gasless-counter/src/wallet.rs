//! Wallet session: the signing capability produced by an authentication flow.

use std::{future::Future, str::FromStr, sync::Arc};

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use tracing::info;

use crate::{AuthenticationError, Result};

/// A signing capability bound to a chain.
///
/// Lives for the lifetime of the process; nothing is persisted.
#[derive(Clone, derive_more::Debug)]
pub struct Session {
    #[debug(ignore)]
    signer: Arc<dyn Signer + Send + Sync>,
    owner: Address,
    chain_id: u64,
}

impl Session {
    /// Wraps a signer into a session for the given chain.
    pub fn new<S>(signer: S, chain_id: u64) -> Self
    where
        S: Signer + Send + Sync + 'static,
    {
        let owner = signer.address();
        Self { signer: Arc::new(signer), owner, chain_id }
    }

    /// The externally owned address controlling the smart account.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The chain the session is bound to.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The signing capability.
    pub fn signer(&self) -> Arc<dyn Signer + Send + Sync> {
        Arc::clone(&self.signer)
    }
}

/// An authentication flow that yields a [`Session`].
///
/// `connect` suspends until the user completes or abandons the flow. Abandoning it fails with
/// [`AuthenticationError::Cancelled`].
pub trait WalletConnector: Send + Sync {
    /// Runs the authentication flow.
    fn connect(&self) -> impl Future<Output = Result<Session>> + Send;
}

/// Authenticates with a locally held secp256k1 key.
#[derive(Clone, derive_more::Debug)]
pub struct LocalKeyConnector {
    #[debug(ignore)]
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl LocalKeyConnector {
    /// Creates a connector from an already parsed signer.
    pub fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self { signer, chain_id }
    }

    /// Parses a hex-encoded private key, with or without `0x` prefix.
    pub fn from_hex(key: &str, chain_id: u64) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AuthenticationError::Cancelled.into());
        }
        let signer = PrivateKeySigner::from_str(key)
            .map_err(|e| AuthenticationError::InvalidKey(e.to_string()))?;
        Ok(Self::new(signer, chain_id))
    }

    /// Creates a connector with a freshly generated key.
    pub fn random(chain_id: u64) -> Self {
        Self::new(PrivateKeySigner::random(), chain_id)
    }
}

impl WalletConnector for LocalKeyConnector {
    async fn connect(&self) -> Result<Session> {
        let signer = self.signer.clone().with_chain_id(Some(self.chain_id));
        let session = Session::new(signer, self.chain_id);
        info!(owner = %session.owner(), chain_id = self.chain_id, "Wallet connected");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GaslessError;

    // Hardhat account #0
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_connect_with_known_key() {
        let session = LocalKeyConnector::from_hex(KEY, 80001).unwrap().connect().await.unwrap();
        assert_eq!(
            session.owner(),
            alloy_primitives::address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
        assert_eq!(session.chain_id(), 80001);
        assert_eq!(session.signer().chain_id(), Some(80001));
    }

    #[test]
    fn test_empty_key_is_a_cancellation() {
        let err = LocalKeyConnector::from_hex("   ", 80001).unwrap_err();
        assert!(matches!(err, GaslessError::Authentication(AuthenticationError::Cancelled)));
    }

    #[test]
    fn test_malformed_key() {
        let err = LocalKeyConnector::from_hex("0x1234", 80001).unwrap_err();
        assert!(matches!(err, GaslessError::Authentication(AuthenticationError::InvalidKey(_))));
    }
}
