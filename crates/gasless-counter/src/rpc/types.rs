//! Wire types of the bundler and paymaster JSON-RPC methods.

use alloy_primitives::{Address, BlockHash, Bytes, TxHash, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    constants::account::{SMART_ACCOUNT_NAME, SMART_ACCOUNT_VERSION},
    user_op::PartialGasLimits,
};

/// The policy under which the paymaster covers the fees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SponsorshipMode {
    /// The paymaster pays the whole fee.
    #[default]
    Sponsored,
    /// The user pays in an ERC-20 token.
    Erc20,
}

/// Identifies the smart account implementation to the paymaster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartAccountInfo {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

impl Default for SmartAccountInfo {
    fn default() -> Self {
        Self { name: SMART_ACCOUNT_NAME.to_string(), version: SMART_ACCOUNT_VERSION.to_string() }
    }
}

/// Second parameter of `pm_sponsorUserOperation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipContext {
    /// Who pays the fee
    pub mode: SponsorshipMode,
    /// Asks the paymaster to return the gas limits it signed over.
    pub calculate_gas_limits: bool,
    /// The account implementation
    pub smart_account_info: SmartAccountInfo,
}

impl Default for SponsorshipContext {
    fn default() -> Self {
        Self {
            mode: SponsorshipMode::Sponsored,
            calculate_gas_limits: true,
            smart_account_info: SmartAccountInfo::default(),
        }
    }
}

/// Result of `pm_sponsorUserOperation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipResponse {
    /// Paymaster address followed by the paymaster-signed validity data.
    #[serde(default)]
    pub paymaster_and_data: Bytes,
    /// The limits covered by the paymaster signature.
    #[serde(flatten)]
    pub gas_limits: PartialGasLimits,
}

/// Result of `eth_getUserOperationReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    /// Hash of the operation
    pub user_op_hash: B256,
    /// The smart account
    #[serde(default)]
    pub sender: Address,
    /// Nonce of the operation
    #[serde(default)]
    pub nonce: U256,
    /// Whether the account call succeeded
    pub success: bool,
    /// Revert reason of a failed call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Fee charged to the paymaster
    #[serde(default)]
    pub actual_gas_cost: U256,
    /// Gas used by the whole operation
    #[serde(default)]
    pub actual_gas_used: U256,
    /// The receipt of the bundle transaction that included the operation.
    pub receipt: InclusionReceipt,
}

/// The subset of the bundle transaction receipt the flow needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionReceipt {
    /// Hash of the bundle transaction
    pub transaction_hash: TxHash,
    /// Inclusion block
    #[serde(with = "alloy_serde::quantity")]
    pub block_number: u64,
    /// Hash of the inclusion block
    #[serde(default)]
    pub block_hash: BlockHash,
}
