//! Error taxonomy of the sponsored counter flow.

use alloy_primitives::{Address, TxHash, B256};
use alloy_transport::TransportError;

use crate::pipeline::Stage;

/// Failures of the interactive wallet authentication.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticationError {
    /// The user abandoned the flow
    #[error("authentication cancelled by the user")]
    Cancelled,

    /// The credential supplied by the user could not be turned into a signer
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Failures while resolving the smart account.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountResolutionError {
    /// No bundler/paymaster deployment is known for the chain
    #[error("unsupported chain id {0}")]
    UnsupportedChain(u64),

    /// Two collaborators disagree on the chain
    #[error("chain id mismatch: expected {expected}, {source_name} reports {actual}")]
    ChainMismatch {
        /// The configured chain id
        expected: u64,
        /// The chain id reported by the collaborator
        actual: u64,
        /// Which collaborator reported it
        source_name: &'static str,
    },

    /// An endpoint URL is malformed
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An endpoint did not answer
    #[error("{endpoint} unreachable: {reason}")]
    Unreachable {
        /// `bundler`, `paymaster` or `chain`
        endpoint: &'static str,
        /// Transport level reason
        reason: String,
    },

    /// The bundler does not serve the configured entry point
    #[error("bundler does not support entry point {0}")]
    EntryPointNotSupported(Address),

    /// The factory call used to derive the address failed
    #[error("address derivation failed: {0}")]
    Derivation(String),
}

/// Error type of the sponsored counter flow.
///
/// Every stage failure aborts the remaining stages of the action that raised it.
#[derive(Debug, thiserror::Error)]
pub enum GaslessError {
    /// Wallet authentication failed or was cancelled. Recoverable, the user may retry.
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// The smart account could not be resolved. Terminal until the configuration is fixed.
    #[error("Account resolution error: {0}")]
    AccountResolution(#[from] AccountResolutionError),

    /// A read-only RPC call failed. Recoverable, the user may retry.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The target call could not be encoded
    #[error("Construction error: {0}")]
    Construction(String),

    /// The user operation could not be assembled or estimated
    #[error("User operation build error: {0}")]
    UserOpBuild(String),

    /// The paymaster rejected the operation or was unreachable. Nothing was submitted.
    #[error("Sponsorship error: {0}")]
    Sponsorship(String),

    /// The bundler rejected the operation
    #[error("Submission error: {0}")]
    Submission(String),

    /// The operation was not included within the configured bound
    #[error("Inclusion timeout: user operation {user_op_hash} not included after {waited_secs}s")]
    InclusionTimeout {
        /// Hash returned by the bundler
        user_op_hash: B256,
        /// Seconds waited before giving up
        waited_secs: u64,
    },

    /// The operation was included but its execution reverted
    #[error("User operation {user_op_hash} reverted in transaction {tx_hash}: {reason}")]
    OperationReverted {
        /// Hash returned by the bundler
        user_op_hash: B256,
        /// Hash of the bundle transaction
        tx_hash: TxHash,
        /// Revert reason reported by the bundler, if any
        reason: String,
    },

    /// A write was triggered before a smart account was resolved
    #[error("No smart account: connect a wallet first")]
    NotConnected,

    /// A write was triggered while another one is still in flight
    #[error("A sponsored transaction is already in flight")]
    PipelineBusy,
}

impl GaslessError {
    /// The stage this error aborts, if it is a write-path failure.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Construction(_) => Some(Stage::Populate),
            Self::UserOpBuild(_) => Some(Stage::Build),
            Self::Sponsorship(_) => Some(Stage::Sponsor),
            Self::Submission(_) | Self::InclusionTimeout { .. } | Self::OperationReverted { .. } => {
                Some(Stage::Submit)
            }
            _ => None,
        }
    }

    /// Whether the error leaves the current action re-triggerable by the user.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::AccountResolution(_))
    }

    /// Whether the bundler reported an entry point `AA3x` (paymaster or signature) failure.
    pub fn is_aa3x(&self) -> bool {
        match self {
            Self::Submission(message) | Self::UserOpBuild(message) => message.contains("AA3"),
            _ => false,
        }
    }
}

impl From<TransportError> for GaslessError {
    fn from(err: TransportError) -> Self {
        Self::Rpc(err.to_string())
    }
}

/// Result type of the sponsored counter flow.
pub type Result<T, E = GaslessError> = std::result::Result<T, E>;
