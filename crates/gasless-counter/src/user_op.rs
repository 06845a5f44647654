//! The ERC-4337 v0.6 user operation envelope.
//!
//! An envelope is built fresh for every write, mutated in place by the sponsorship and
//! reconcile stages, signed, and submitted exactly once.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolValue};
use serde::{Deserialize, Serialize};

use crate::{GaslessError, Result};

sol! {
    /// Static fields of a user operation as hashed by the v0.6 entry point.
    struct PackedUserOperation {
        address sender;
        uint256 nonce;
        bytes32 initCodeHash;
        bytes32 callDataHash;
        uint256 callGasLimit;
        uint256 verificationGasLimit;
        uint256 preVerificationGas;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        bytes32 paymasterAndDataHash;
    }
}

/// A user operation in the v0.6 wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The smart account
    pub sender: Address,
    /// Entry point nonce, key in the upper 192 bits
    pub nonce: U256,
    /// Factory address and deploy call, empty once the account exists
    pub init_code: Bytes,
    /// Call executed by the account
    pub call_data: Bytes,
    /// See [`GasLimits::call_gas_limit`]
    pub call_gas_limit: U256,
    /// See [`GasLimits::verification_gas_limit`]
    pub verification_gas_limit: U256,
    /// See [`GasLimits::pre_verification_gas`]
    pub pre_verification_gas: U256,
    /// EIP-1559 fee cap
    pub max_fee_per_gas: U256,
    /// EIP-1559 tip
    pub max_priority_fee_per_gas: U256,
    /// Paymaster address followed by its signed validity data
    pub paymaster_and_data: Bytes,
    /// Signature checked by the account validation module
    pub signature: Bytes,
}

/// The three gas limits a paymaster signs over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasLimits {
    /// Gas of the account call
    pub call_gas_limit: U256,
    /// Gas of account and paymaster validation, including deployment
    pub verification_gas_limit: U256,
    /// Bundler overhead paid on top of the executed gas
    pub pre_verification_gas: U256,
}

/// Gas limits as returned by a paymaster, any of which may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PartialGasLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<U256>,
}

impl PartialGasLimits {
    /// Returns the complete triple, or `None` if any limit is missing.
    pub fn complete(&self) -> Option<GasLimits> {
        Some(GasLimits {
            call_gas_limit: self.call_gas_limit?,
            verification_gas_limit: self.verification_gas_limit?,
            pre_verification_gas: self.pre_verification_gas?,
        })
    }

    /// Whether the paymaster returned no limit at all.
    pub fn is_empty(&self) -> bool {
        self.call_gas_limit.is_none() &&
            self.verification_gas_limit.is_none() &&
            self.pre_verification_gas.is_none()
    }
}

impl From<GasLimits> for PartialGasLimits {
    fn from(limits: GasLimits) -> Self {
        Self {
            call_gas_limit: Some(limits.call_gas_limit),
            verification_gas_limit: Some(limits.verification_gas_limit),
            pre_verification_gas: Some(limits.pre_verification_gas),
        }
    }
}

/// What the reconcile stage did to the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// All three limits were replaced by the paymaster-signed values.
    Overwritten(GasLimits),
    /// The paymaster returned an incomplete triple; the estimates were kept.
    KeptEstimates {
        /// The limits the paymaster did return
        returned: PartialGasLimits,
    },
}

impl UserOperation {
    /// The gas limits currently carried by the envelope.
    pub fn gas_limits(&self) -> GasLimits {
        GasLimits {
            call_gas_limit: self.call_gas_limit,
            verification_gas_limit: self.verification_gas_limit,
            pre_verification_gas: self.pre_verification_gas,
        }
    }

    /// Replaces all three gas limits.
    pub fn set_gas_limits(&mut self, limits: GasLimits) {
        self.call_gas_limit = limits.call_gas_limit;
        self.verification_gas_limit = limits.verification_gas_limit;
        self.pre_verification_gas = limits.pre_verification_gas;
    }

    /// Merges paymaster-returned limits into the envelope.
    ///
    /// The limits are overwritten only when the paymaster returned all three of them. The
    /// paymaster signature in `paymasterAndData` covers exactly those values, so submitting any
    /// other triple makes the entry point reject the operation with `AA34`.
    pub fn reconcile(&mut self, returned: PartialGasLimits) -> Reconciliation {
        match returned.complete() {
            Some(limits) => {
                self.set_gas_limits(limits);
                Reconciliation::Overwritten(limits)
            }
            None => Reconciliation::KeptEstimates { returned },
        }
    }

    /// Whether the account contract still has to be deployed by this operation.
    pub fn deploys_account(&self) -> bool {
        !self.init_code.is_empty()
    }

    /// Checks the envelope is complete enough to be sent to the paymaster.
    pub fn validate_for_sponsorship(&self) -> Result<()> {
        if self.sender.is_zero() {
            return Err(GaslessError::UserOpBuild("user operation has no sender".to_string()));
        }
        if self.call_data.is_empty() {
            return Err(GaslessError::UserOpBuild("user operation has no call data".to_string()));
        }
        if self.signature.is_empty() {
            return Err(GaslessError::UserOpBuild(
                "user operation has no placeholder signature".to_string(),
            ));
        }
        let limits = self.gas_limits();
        if limits.call_gas_limit.is_zero() ||
            limits.verification_gas_limit.is_zero() ||
            limits.pre_verification_gas.is_zero()
        {
            return Err(GaslessError::UserOpBuild(format!(
                "user operation gas limits are not estimated: {limits:?}"
            )));
        }
        Ok(())
    }

    /// Checks the envelope carries sponsorship data and may be signed and sent.
    pub fn validate_for_submission(&self) -> Result<()> {
        if self.paymaster_and_data.is_empty() {
            return Err(GaslessError::Sponsorship(
                "user operation carries no paymaster data".to_string(),
            ));
        }
        if self.max_fee_per_gas < self.max_priority_fee_per_gas {
            return Err(GaslessError::UserOpBuild(format!(
                "max fee per gas {} below priority fee {}",
                self.max_fee_per_gas, self.max_priority_fee_per_gas
            )));
        }
        Ok(())
    }

    /// Packs the static fields the entry point hashes.
    pub fn pack(&self) -> PackedUserOperation {
        PackedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            initCodeHash: keccak256(&self.init_code),
            callDataHash: keccak256(&self.call_data),
            callGasLimit: self.call_gas_limit,
            verificationGasLimit: self.verification_gas_limit,
            preVerificationGas: self.pre_verification_gas,
            maxFeePerGas: self.max_fee_per_gas,
            maxPriorityFeePerGas: self.max_priority_fee_per_gas,
            paymasterAndDataHash: keccak256(&self.paymaster_and_data),
        }
    }

    /// Computes the v0.6 user operation hash, the digest the owner signs.
    ///
    /// `keccak256(abi.encode(keccak256(pack(op)), entryPoint, chainId))`
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let inner = keccak256(self.pack().abi_encode());
        keccak256((inner, entry_point, U256::from(chain_id)).abi_encode_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, bytes};

    fn sample_op() -> UserOperation {
        UserOperation {
            sender: address!("1000000000000000000000000000000000000001"),
            nonce: U256::from(3),
            call_data: bytes!("d09de08a"),
            call_gas_limit: U256::from(50_000),
            verification_gas_limit: U256::from(100_000),
            pre_verification_gas: U256::from(45_000),
            max_fee_per_gas: U256::from(2_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            signature: bytes!("01"),
            ..Default::default()
        }
    }

    #[test]
    fn test_reconcile_overwrites_complete_triple() {
        let mut op = sample_op();
        let signed = GasLimits {
            call_gas_limit: U256::from(61_000),
            verification_gas_limit: U256::from(120_000),
            pre_verification_gas: U256::from(48_000),
        };
        let outcome = op.reconcile(signed.into());
        assert_eq!(outcome, Reconciliation::Overwritten(signed));
        assert_eq!(op.gas_limits(), signed);
    }

    #[test]
    fn test_reconcile_keeps_estimates_on_partial_triple() {
        let mut op = sample_op();
        let before = op.gas_limits();
        let returned = PartialGasLimits {
            call_gas_limit: Some(U256::from(1)),
            verification_gas_limit: None,
            pre_verification_gas: Some(U256::from(2)),
        };
        assert_eq!(op.reconcile(returned), Reconciliation::KeptEstimates { returned });
        assert_eq!(op.gas_limits(), before);
    }

    #[test]
    fn test_hash_covers_paymaster_data_and_gas() {
        let entry_point = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");
        let mut op = sample_op();
        let unsponsored = op.hash(entry_point, 80001);
        assert_eq!(unsponsored, op.clone().hash(entry_point, 80001));

        op.paymaster_and_data = bytes!("aabbcc");
        let sponsored = op.hash(entry_point, 80001);
        assert_ne!(unsponsored, sponsored);

        op.call_gas_limit += U256::from(1);
        assert_ne!(sponsored, op.hash(entry_point, 80001));
        assert_ne!(op.hash(entry_point, 80001), op.hash(entry_point, 80002));
    }

    #[test]
    fn test_signature_is_not_hashed() {
        let entry_point = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");
        let mut op = sample_op();
        let hash = op.hash(entry_point, 80001);
        op.signature = bytes!("ffff");
        assert_eq!(hash, op.hash(entry_point, 80001));
    }

    #[test]
    fn test_validation_gates() {
        let mut op = sample_op();
        op.validate_for_sponsorship().unwrap();
        assert!(matches!(op.validate_for_submission(), Err(GaslessError::Sponsorship(_))));

        op.paymaster_and_data = bytes!("aa");
        op.validate_for_submission().unwrap();

        op.call_gas_limit = U256::ZERO;
        assert!(matches!(op.validate_for_sponsorship(), Err(GaslessError::UserOpBuild(_))));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = serde_json::to_value(sample_op()).unwrap();
        assert_eq!(json["callGasLimit"], "0xc350");
        assert_eq!(json["paymasterAndData"], "0x");
        assert!(json.get("call_gas_limit").is_none());
    }
}
