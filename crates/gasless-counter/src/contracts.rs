//! Solidity interfaces of the contracts the flow talks to.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

sol! {
    /// The counter contract.
    interface ICounter {
        function getCount() external view returns (uint256);
        function increment() external;
    }

    /// The subset of the v0.6 entry point used by the flow.
    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }

    /// The v2 smart-account factory.
    interface IAccountFactory {
        function getAddressForCounterFactualAccount(
            address moduleSetupContract,
            bytes calldata moduleSetupData,
            uint256 index
        ) external view returns (address _account);

        function deployCounterFactualAccount(
            address moduleSetupContract,
            bytes calldata moduleSetupData,
            uint256 index
        ) external returns (address proxy);
    }

    /// The ECDSA ownership validation module.
    interface IEcdsaOwnershipModule {
        function initForSmartAccount(address eoaOwner) external returns (address);
    }

    /// The v2 smart account execution entry.
    interface ISmartAccount {
        function execute_ncC(address dest, uint256 value, bytes calldata func) external;
    }
}

/// A raw call the smart account should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Target contract
    pub to: Address,
    /// Native value to transfer
    pub value: U256,
    /// ABI-encoded call data
    pub data: Bytes,
}

impl Call {
    /// Creates a zero-value call.
    pub fn new(to: Address, data: Bytes) -> Self {
        Self { to, value: U256::ZERO, data }
    }

    /// Encodes the call as the smart account's `execute_ncC` payload.
    pub fn to_account_call_data(&self) -> Bytes {
        ISmartAccount::execute_ncCCall { dest: self.to, value: self.value, func: self.data.clone() }
            .abi_encode()
            .into()
    }
}

/// Encodes `increment()` on the counter contract.
pub fn increment_call(counter: Address) -> Call {
    Call::new(counter, ICounter::incrementCall {}.abi_encode().into())
}
